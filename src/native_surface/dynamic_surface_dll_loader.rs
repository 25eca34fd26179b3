use anyhow::{Context, Result, anyhow};
use libloading::{Library, Symbol};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::bindings as b;

/// The resolved symbol table of the native surface library.
#[derive(Debug)]
pub struct SurfaceDll {
    _lib: &'static Library,
    pub path: PathBuf,

    pub wvbridge_create: Symbol<'static, b::wvbridge_create_fn>,
    pub wvbridge_resize: Symbol<'static, b::wvbridge_resize_fn>,
    pub wvbridge_navigate: Symbol<'static, b::wvbridge_navigate_fn>,
    pub wvbridge_destroy: Symbol<'static, b::wvbridge_destroy_fn>,
    pub wvbridge_set_progress_callback: Symbol<'static, b::wvbridge_set_progress_callback_fn>,
    pub wvbridge_set_navigation_callback: Symbol<'static, b::wvbridge_set_navigation_callback_fn>,
}

static SURFACE_DLL_CACHE: Lazy<Mutex<HashMap<PathBuf, Arc<SurfaceDll>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Directory of the running executable, used when no library directory is configured.
fn exe_directory() -> Result<PathBuf> {
    std::env::current_exe()
        .context("Failed to get current exe path")?
        .parent()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("Exe has no parent directory"))
}

impl SurfaceDll {
    /// Loads `library_name` (without platform prefix/suffix) from `dir`, or from
    /// the executable's directory. The library stays mapped for the life of the process.
    pub fn load(dir: Option<&Path>, library_name: &str) -> Result<Self> {
        let dll_dir = match dir {
            Some(d) => d.to_path_buf(),
            None => exe_directory()?,
        };

        let dll_path = dll_dir.join(libloading::library_filename(library_name));

        let lib_static: &'static Library = Box::leak(Box::new(
            unsafe { Library::new(&dll_path) }
                .with_context(|| format!("Failed to load {}", dll_path.display()))?,
        ));

        macro_rules! load_symbol {
            ($lib:expr, $name:expr) => {
                unsafe { $lib.get($name) }.with_context(|| {
                    format!(
                        "Missing symbol: {} in {}",
                        String::from_utf8_lossy(&$name[..$name.len() - 1]),
                        dll_path.display()
                    )
                })
            };
        }

        log::info!("[SurfaceDll] Loaded {}", dll_path.display());

        Ok(SurfaceDll {
            _lib: lib_static,
            wvbridge_create: load_symbol!(lib_static, b"wvbridge_create\0")?,
            wvbridge_resize: load_symbol!(lib_static, b"wvbridge_resize\0")?,
            wvbridge_navigate: load_symbol!(lib_static, b"wvbridge_navigate\0")?,
            wvbridge_destroy: load_symbol!(lib_static, b"wvbridge_destroy\0")?,
            wvbridge_set_progress_callback: load_symbol!(
                lib_static,
                b"wvbridge_set_progress_callback\0"
            )?,
            wvbridge_set_navigation_callback: load_symbol!(
                lib_static,
                b"wvbridge_set_navigation_callback\0"
            )?,
            path: dll_path,
        })
    }

    /// Returns the cached library for `dir`, loading it on first use.
    pub fn get_for(dir: Option<&Path>, library_name: &str) -> Result<Arc<Self>> {
        let dll_dir = match dir {
            Some(d) => d.to_path_buf(),
            None => exe_directory().context("Failed to resolve library directory for cache key")?,
        };
        let key = dll_dir.join(libloading::library_filename(library_name));

        let mut cache = SURFACE_DLL_CACHE.lock();

        if let Some(existing) = cache.get(&key) {
            return Ok(existing.clone());
        }

        let dll = Self::load(Some(&dll_dir), library_name).with_context(|| {
            format!("Failed to load SurfaceDll from {}", key.display())
        })?;
        let arc_dll = Arc::new(dll);
        cache.insert(key, arc_dll.clone());
        Ok(arc_dll)
    }
}
