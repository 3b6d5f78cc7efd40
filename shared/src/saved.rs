//! Saved-command namespace
//!
//! Records live under decimal index keys `0..n` with the count under `n`.
//! Indices stay dense: deleting shifts every later record down by one.
//!
//! [`SavedCommands`] borrows the store for the duration of one operation, so
//! every read-modify-write below happens inside a single guard acquisition.

use crate::codec;
use crate::store::{KvStore, StoreError};
use crate::timing;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Key holding the record count
pub const COUNT_KEY: &str = "n";

/// Errors from saved-command operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SavedError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("index {index} out of range (count: {count})")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("saved record {0} could not be parsed")]
    Corrupt(usize),

    #[error("record too large: {0} bytes (max: {max})", max = timing::SAVED_RECORD_MAX - 1)]
    TooLarge(usize),

    #[error("{0}")]
    Invalid(&'static str),
}

fn default_bits() -> u16 {
    timing::DEFAULT_BITS
}

/// One persisted transmit recipe
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SavedCommand {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub value: String,
    #[serde(default = "default_bits")]
    pub bits: u16,
}

impl Default for SavedCommand {
    fn default() -> Self {
        Self {
            name: String::new(),
            protocol: String::new(),
            value: String::new(),
            bits: timing::DEFAULT_BITS,
        }
    }
}

impl SavedCommand {
    pub fn new(
        name: impl Into<String>,
        protocol: impl Into<String>,
        value: impl Into<String>,
        bits: u16,
    ) -> Self {
        Self {
            name: name.into(),
            protocol: protocol.into(),
            value: value.into(),
            bits,
        }
    }

    /// Check the record is storable, returning the first failing reason
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.protocol.is_empty() {
            Err("Missing protocol")
        } else if self.value.is_empty() {
            Err("Missing value")
        } else if !codec::is_hex_value(&self.value) {
            Err("Value must be hex")
        } else if !(timing::SAVED_BITS_MIN..=timing::SAVED_BITS_MAX).contains(&self.bits) {
            Err("Bits out of range")
        } else {
            Ok(())
        }
    }

    /// Serialize for storage, enforcing the record size limit
    pub fn encode(&self) -> Result<String, SavedError> {
        let raw = serde_json::to_string(self).map_err(|e| StoreError::Backend(e.to_string()))?;
        if raw.len() >= timing::SAVED_RECORD_MAX {
            return Err(SavedError::TooLarge(raw.len()));
        }
        Ok(raw)
    }

    /// Whether the transmit codec can send this protocol
    pub fn is_transmittable(&self) -> bool {
        codec::is_supported_protocol(&self.protocol)
    }
}

/// A saved command together with its index, as listed to clients
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SavedEntry {
    pub index: usize,
    #[serde(flatten)]
    pub command: SavedCommand,
}

/// One skipped import entry
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ImportIssue {
    pub index: usize,
    pub reason: &'static str,
}

/// Outcome of a bulk import
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<ImportIssue>,
    pub total: usize,
}

impl ImportSummary {
    fn skip(&mut self, index: usize, reason: &'static str) {
        self.skipped += 1;
        if self.errors.len() < timing::IMPORT_MAX_ERRORS {
            self.errors.push(ImportIssue { index, reason });
        }
    }
}

#[derive(Serialize)]
struct CompactEntry<'a> {
    i: i64,
    n: &'a str,
}

#[derive(Serialize)]
struct TruncatedMarker {
    i: i64,
    n: &'static str,
    #[serde(rename = "_truncated")]
    truncated: bool,
    #[serde(rename = "_total")]
    total: usize,
}

/// Operations over the saved-command namespace of a borrowed store
pub struct SavedCommands<'a> {
    store: &'a mut dyn KvStore,
}

impl<'a> SavedCommands<'a> {
    pub fn new(store: &'a mut dyn KvStore) -> Self {
        Self { store }
    }

    /// Number of saved records
    pub fn count(&self) -> Result<usize, SavedError> {
        match self.store.get(COUNT_KEY)? {
            None => Ok(0),
            Some(raw) => raw.trim().parse().map_err(|_| {
                SavedError::Store(StoreError::Corrupt {
                    key: COUNT_KEY.to_string(),
                })
            }),
        }
    }

    fn check_index(&self, index: usize) -> Result<usize, SavedError> {
        let count = self.count()?;
        if index >= count {
            return Err(SavedError::IndexOutOfRange { index, count });
        }
        Ok(count)
    }

    fn raw(&self, index: usize) -> Result<Option<String>, SavedError> {
        Ok(self.store.get(&index.to_string())?)
    }

    fn decode(&self, index: usize) -> Result<SavedCommand, SavedError> {
        let raw = self.raw(index)?.ok_or(SavedError::Corrupt(index))?;
        serde_json::from_str(&raw).map_err(|_| SavedError::Corrupt(index))
    }

    /// Read the record at `index`
    pub fn get(&self, index: usize) -> Result<SavedCommand, SavedError> {
        self.check_index(index)?;
        self.decode(index)
    }

    /// All records in index order. Unreadable records list with empty fields.
    pub fn list(&self) -> Result<Vec<SavedEntry>, SavedError> {
        let count = self.count()?;
        let mut entries = Vec::with_capacity(count);
        for index in 0..count {
            let command = match self.decode(index) {
                Ok(command) => command,
                Err(SavedError::Corrupt(_)) => SavedCommand::default(),
                Err(e) => return Err(e),
            };
            entries.push(SavedEntry { index, command });
        }
        Ok(entries)
    }

    /// First index whose name matches, ignoring ASCII case
    pub fn find_by_name(&self, name: &str) -> Result<Option<usize>, SavedError> {
        if name.is_empty() {
            return Ok(None);
        }
        let count = self.count()?;
        for index in 0..count {
            let Ok(command) = self.decode(index) else {
                continue;
            };
            if command.name.eq_ignore_ascii_case(name) {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Append a record, returning its index
    pub fn append(&mut self, command: &SavedCommand) -> Result<usize, SavedError> {
        command.validate().map_err(SavedError::Invalid)?;
        let raw = command.encode()?;
        let index = self.count()?;
        self.store.put(&index.to_string(), &raw)?;
        self.store.put(COUNT_KEY, &(index + 1).to_string())?;
        self.store.commit()?;
        Ok(index)
    }

    /// Append every valid entry of `items`, skipping the rest with a reason
    pub fn import(&mut self, items: &[Value]) -> Result<ImportSummary, SavedError> {
        let mut summary = ImportSummary::default();
        let mut count = self.count()?;

        for (i, item) in items.iter().enumerate() {
            let Some(obj) = item.as_object() else {
                summary.skip(i, "Entry is not an object");
                continue;
            };

            let text = |key: &str| obj.get(key).and_then(Value::as_str).unwrap_or("").to_string();
            let bits = match obj.get("bits").and_then(Value::as_u64) {
                Some(b) => u16::try_from(b).unwrap_or(0),
                None => timing::DEFAULT_BITS,
            };
            let command = SavedCommand::new(text("name"), text("protocol"), text("value"), bits);

            if let Err(reason) = command.validate() {
                summary.skip(i, reason);
                continue;
            }
            let raw = match command.encode() {
                Ok(raw) => raw,
                Err(_) => {
                    summary.skip(i, "Entry too large");
                    continue;
                }
            };

            self.store.put(&count.to_string(), &raw)?;
            count += 1;
            summary.imported += 1;
        }

        self.store.put(COUNT_KEY, &count.to_string())?;
        self.store.commit()?;
        summary.total = count;
        Ok(summary)
    }

    /// Remove the record at `index`, shifting later ones down. Returns the new count.
    pub fn delete(&mut self, index: usize) -> Result<usize, SavedError> {
        let count = self.check_index(index)?;
        for i in index..count - 1 {
            let next = self.raw(i + 1)?.unwrap_or_else(|| "{}".to_string());
            self.store.put(&i.to_string(), &next)?;
        }
        self.store.put(COUNT_KEY, &(count - 1).to_string())?;
        self.store.commit()?;
        Ok(count - 1)
    }

    /// Replace the name of the record at `index`
    pub fn rename(&mut self, index: usize, name: &str) -> Result<(), SavedError> {
        self.check_index(index)?;
        let mut command = self.decode(index)?;
        command.name = name.to_string();
        let raw = command.encode()?;
        self.store.put(&index.to_string(), &raw)?;
        self.store.commit()?;
        Ok(())
    }

    /// Index and name listing sized for one characteristic read.
    ///
    /// When records are left out, a marker entry with index -1 carries the
    /// full count.
    pub fn compact_listing(&self) -> Result<String, SavedError> {
        let count = self.count()?;
        let mut out = String::from("[");
        let mut index = 0;

        while index < count {
            let command = self.decode(index).unwrap_or_default();
            let entry = CompactEntry {
                i: index as i64,
                n: &command.name,
            };
            let mut frag = String::new();
            if out.len() > 1 {
                frag.push(',');
            }
            frag.push_str(&serde_json::to_string(&entry).map_err(|e| StoreError::Backend(e.to_string()))?);

            if out.len() + frag.len() + timing::COMPACT_TRUNCATED_SUFFIX > timing::COMPACT_LISTING_MAX {
                break;
            }
            out.push_str(&frag);
            index += 1;
        }

        if index < count {
            if out.len() > 1 {
                out.push(',');
            }
            let marker = TruncatedMarker {
                i: -1,
                n: "",
                truncated: true,
                total: count,
            };
            out.push_str(&serde_json::to_string(&marker).map_err(|e| StoreError::Backend(e.to_string()))?);
        }
        out.push(']');
        Ok(out)
    }

    /// Plain-text listing suitable for pasting into firmware
    pub fn dump(&self) -> Result<String, SavedError> {
        let count = self.count()?;
        let mut out = String::from("// Saved IR codes - paste into firmware\n");
        out.push_str(&format!("// Count: {}\n\n", count));

        for index in 0..count {
            let command = self.decode(index).unwrap_or_else(|_| SavedCommand {
                protocol: "UNKNOWN".into(),
                value: "0".into(),
                ..Default::default()
            });
            let SavedCommand {
                name,
                protocol,
                value,
                bits,
            } = &command;

            out.push_str(&format!("// {} {} {} 0x{} {}b\n", index, name, protocol, value, bits));
            if command.is_transmittable() {
                out.push_str(&format!("irsend.sendNEC(0x{}u, {});  // {}\n", value, bits, name));
            } else {
                out.push_str(&format!(
                    "// irsend.send... (unsupported protocol); value=0x{} {}\n",
                    value, name
                ));
            }
        }
        Ok(out)
    }
}
