//! Creature and squad reconstruction passes
//!
//! Both passes resolve a vector through the active layout and hand every
//! element address to a caller-supplied decoder. A decoder returning `None`
//! means "not the kind of element we want" and the element is skipped.

use super::ProcessInstance;
use crate::driver::MemoryDriver;
use crate::error::{Error, Result};
use crate::progress::ProgressEvent;
use crate::VirtAddr;

impl<D: MemoryDriver> ProcessInstance<D> {
    /// Resolve `name` through the layout and check it lands in mapped memory
    fn checked_address(&self, name: &str) -> Result<VirtAddr> {
        let missing = || Error::MissingAddress(name.to_string());
        let layout = self.memory_layout().ok_or_else(missing)?;
        let Some(address) = self.corrected_address(name) else {
            tracing::info!("{} not supported by {}", name, layout.game_version());
            return Err(missing());
        };

        if !self.is_valid_address(address) {
            tracing::warn!(
                "Active Memory Layout {} ({}) contains an invalid {} address {:#x}. \
                 Either you are scanning a new DF version or your config files are corrupted.",
                layout.filename().display(),
                layout.game_version(),
                name,
                address
            );
            return Err(Error::InvalidAddress {
                name: name.to_string(),
                address,
            });
        }

        tracing::debug!(
            "{} at {:#x} ({:#x} UNCORRECTED)",
            name,
            address,
            address.wrapping_add_signed(-self.memory_correction)
        );
        Ok(address)
    }

    /// Decode every element of `vector`, reporting progress per element
    fn decode_elements<T>(
        &mut self,
        entries: &[VirtAddr],
        decode: &mut impl FnMut(&mut Self, VirtAddr) -> Option<T>,
    ) -> Vec<T> {
        let mut records = Vec::new();
        if entries.is_empty() {
            return records;
        }

        self.emit(ProgressEvent::ProgressRange(0, entries.len() as u64 - 1));
        for (i, &address) in entries.iter().enumerate() {
            match decode(self, address) {
                Some(record) => records.push(record),
                None => tracing::trace!("skipping element at {:#x}", address),
            }
            self.emit(ProgressEvent::ProgressValue(i as u64));
        }
        records
    }

    /// Remap, read the dwarven race id and decode the creature vector.
    ///
    /// An empty creature vector means no fortress is loaded; the instance
    /// is then marked unhealthy so the caller can drop the connection.
    pub fn load_dwarves<T>(
        &mut self,
        mut decode: impl FnMut(&mut Self, VirtAddr) -> Option<T>,
    ) -> Vec<T> {
        self.map_virtual_memory();
        if !self.is_ok {
            tracing::warn!("not connected");
            return Vec::new();
        }

        let (Ok(creature_vector), Ok(race_index)) = (
            self.checked_address("creature_vector"),
            self.checked_address("dwarf_race_index"),
        ) else {
            return Vec::new();
        };

        self.emit(ProgressEvent::ProgressMessage("Loading Dwarves".to_string()));
        if !self.attach() {
            return Vec::new();
        }

        self.dwarf_race_id = self.read_word(race_index);
        tracing::debug!("dwarf race: {:#x}", self.dwarf_race_id);

        let entries = self.enumerate_vector(creature_vector);
        tracing::trace!("FOUND {} creatures", entries.len());
        let dwarves = self.decode_elements(&entries, &mut decode);
        if entries.is_empty() {
            // fortress unloaded or the game is gone
            self.is_ok = false;
        }

        self.detach();
        tracing::info!(
            "found {} dwarves out of {} creatures",
            dwarves.len(),
            entries.len()
        );
        dwarves
    }

    /// Decode the squad vector. Versions without squad support yield nothing.
    pub fn load_squads<T>(
        &mut self,
        mut decode: impl FnMut(&mut Self, VirtAddr) -> Option<T>,
    ) -> Vec<T> {
        if !self.is_ok {
            tracing::warn!("not connected");
            return Vec::new();
        }

        let Ok(squad_vector) = self.checked_address("squad_vector") else {
            return Vec::new();
        };

        self.emit(ProgressEvent::ProgressMessage("Loading Squads".to_string()));
        if !self.attach() {
            return Vec::new();
        }

        let entries = self.enumerate_vector(squad_vector);
        tracing::trace!("FOUND {} squads", entries.len());
        let squads = self.decode_elements(&entries, &mut decode);

        self.detach();
        tracing::info!("Found {} squads out of {}", squads.len(), entries.len());
        squads
    }

    /// Cheap liveness probe: the creature vector must still have entries.
    /// Emits [`ProgressEvent::ConnectionInterrupted`] and returns false when
    /// it does not.
    pub fn heartbeat(&mut self) -> bool {
        let Some(creature_vector) = self.corrected_address("creature_vector") else {
            return true;
        };

        if self.enumerate_vector(creature_vector).is_empty() {
            tracing::info!("creature vector is empty, connection interrupted");
            self.emit(ProgressEvent::ConnectionInterrupted);
            return false;
        }
        true
    }
}
