//! Saved-command resolver shared by every front-end

use crate::store::StoreGuard;
use irblaster_shared::codec::parse_hex_code;
use irblaster_shared::{SavedError, StoreError, TransmitQueue};
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

/// How a front-end names a saved command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandRef {
    Index(usize),
    Name(String),
}

impl fmt::Display for CommandRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandRef::Index(index) => write!(f, "#{}", index),
            CommandRef::Name(name) => write!(f, "{:?}", name),
        }
    }
}

/// Why a saved command was not sent
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("saved command {0} not found")]
    NotFound(CommandRef),

    #[error("saved command #{index} uses unsupported protocol {protocol:?}")]
    Unsupported { index: usize, protocol: String },

    #[error("saved command #{0} has a value that is not hex")]
    InvalidValue(usize),

    #[error("saved command #{0} could not be parsed")]
    Corrupt(usize),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<SavedError> for ResolveError {
    fn from(e: SavedError) -> Self {
        match e {
            SavedError::Store(e) => ResolveError::Store(e),
            SavedError::IndexOutOfRange { index, .. } => ResolveError::NotFound(CommandRef::Index(index)),
            SavedError::Corrupt(index) => ResolveError::Corrupt(index),
            other => ResolveError::Store(StoreError::Backend(other.to_string())),
        }
    }
}

/// A saved command that was handed to the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentCommand {
    pub index: usize,
    pub name: String,
}

impl SentCommand {
    /// The stored name, or the index when the command is unnamed
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            self.index.to_string()
        } else {
            self.name.clone()
        }
    }
}

/// Looks up saved commands and queues them for transmission
#[derive(Clone)]
pub struct Resolver {
    store: StoreGuard,
    queue: TransmitQueue,
}

impl Resolver {
    pub fn new(store: StoreGuard, queue: TransmitQueue) -> Self {
        Self { store, queue }
    }

    pub fn store(&self) -> &StoreGuard {
        &self.store
    }

    pub fn queue(&self) -> &TransmitQueue {
        &self.queue
    }

    /// First index whose stored name matches `name`, ignoring case
    pub async fn resolve_by_name(&self, name: &str) -> Result<Option<usize>, ResolveError> {
        let name = name.to_string();
        Ok(self.store.with_saved(move |saved| saved.find_by_name(&name)).await?)
    }

    /// Queue the saved command at `index` for one transmission
    pub async fn send_saved(&self, index: usize) -> Result<SentCommand, ResolveError> {
        // Lease is released before the dispatcher is touched
        let command = self.store.with_saved(move |saved| saved.get(index)).await?;

        if !command.is_transmittable() {
            warn!(
                "[IR] Unsupported protocol for saved code #{}: {}",
                index, command.protocol
            );
            return Err(ResolveError::Unsupported {
                index,
                protocol: command.protocol,
            });
        }
        let code = parse_hex_code(&command.value).ok_or(ResolveError::InvalidValue(index))?;

        self.queue.queue(code, command.bits, 1);
        info!(
            "[IR] TX NEC 0x{} {}b ({})",
            command.value,
            command.bits,
            if command.name.is_empty() { "no name" } else { &command.name }
        );

        Ok(SentCommand {
            index,
            name: command.name,
        })
    }

    /// Resolve `target` and send it
    pub async fn resolve_and_send(&self, target: CommandRef) -> Result<SentCommand, ResolveError> {
        let index = match &target {
            CommandRef::Index(index) => *index,
            CommandRef::Name(name) => self
                .resolve_by_name(name)
                .await?
                .ok_or_else(|| ResolveError::NotFound(target.clone()))?,
        };
        self.send_saved(index).await
    }
}
