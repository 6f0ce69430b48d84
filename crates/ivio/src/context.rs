//! Process-wide state shared by input and output sessions.
//!
//! A [`GlobalContext`] is created once and handed to sessions as an
//! `Arc`. It replaces hidden statics: the fallback dictionary, the header
//! registry, the search path and the environment switches all live here.

use crate::error::Result;
use crate::input::header::{FormatVersion, HeaderHook, HeaderRegistry};
use crate::options::{EnvSwitches, ReadOptions, WriteOptions};
use crate::refs::GlobalDictionary;
use crate::search::SearchPath;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

/// Shared state for every session of a process.
#[derive(Debug)]
pub struct GlobalContext {
    dictionary: GlobalDictionary,
    headers: RwLock<HeaderRegistry>,
    search_path: RwLock<SearchPath>,
    switches: EnvSwitches,
}

impl Default for GlobalContext {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalContext {
    /// Context with the default headers and all switches off.
    pub fn new() -> Self {
        Self::with_switches(EnvSwitches::default())
    }

    /// Context with switches read from the environment.
    pub fn from_env() -> Self {
        Self::with_switches(EnvSwitches::from_env())
    }

    pub fn with_switches(switches: EnvSwitches) -> Self {
        Self {
            dictionary: GlobalDictionary::new(),
            headers: RwLock::new(HeaderRegistry::with_defaults()),
            search_path: RwLock::new(SearchPath::new()),
            switches,
        }
    }

    /// Shorthand for `Arc::new(GlobalContext::new())`.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn dictionary(&self) -> &GlobalDictionary {
        &self.dictionary
    }

    pub fn headers(&self) -> RwLockReadGuard<'_, HeaderRegistry> {
        self.headers.read()
    }

    pub fn headers_mut(&self) -> RwLockWriteGuard<'_, HeaderRegistry> {
        self.headers.write()
    }

    /// Register an extra header line.
    pub fn register_header(
        &self,
        text: &str,
        binary: bool,
        version: FormatVersion,
        pre: Option<HeaderHook>,
        post: Option<HeaderHook>,
    ) -> Result<()> {
        self.headers.write().register(text, binary, version, pre, post)
    }

    pub fn search_path(&self) -> RwLockReadGuard<'_, SearchPath> {
        self.search_path.read()
    }

    pub fn search_path_mut(&self) -> RwLockWriteGuard<'_, SearchPath> {
        self.search_path.write()
    }

    pub fn switches(&self) -> EnvSwitches {
        self.switches
    }

    /// Read options seeded from the switches.
    pub fn read_options(&self) -> ReadOptions {
        ReadOptions::from_switches(&self.switches)
    }

    /// Write options seeded from the switches.
    pub fn write_options(&self) -> WriteOptions {
        WriteOptions::from_switches(&self.switches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ivio_core::ObjectHandle;

    #[test]
    fn test_defaults() {
        let ctx = GlobalContext::new();
        assert!(ctx.headers().is_valid_header("#Inventor V2.1 ascii"));
        assert_eq!(ctx.search_path().directories().len(), 1);
        assert!(!ctx.read_options().search_global_dictionary);
    }

    #[test]
    fn test_register_header() {
        let ctx = GlobalContext::new();
        ctx.register_header("#Custom V3.0", false, FormatVersion::new(3, 0), None, None)
            .unwrap();
        assert_eq!(ctx.headers().version("#Custom V3.0"), Some(FormatVersion::new(3, 0)));
        let version = FormatVersion::new(3, 0);
        assert!(ctx.register_header("Custom", false, version, None, None).is_err());
    }

    #[test]
    fn test_switches_reach_options() {
        let ctx = GlobalContext::with_switches(EnvSwitches {
            search_global_dict: true,
            ..Default::default()
        });
        assert!(ctx.read_options().search_global_dictionary);
        ctx.dictionary().define("Shared", ObjectHandle::node(9));
        assert_eq!(ctx.dictionary().lookup("Shared", None), Some(ObjectHandle::node(9)));
    }
}
