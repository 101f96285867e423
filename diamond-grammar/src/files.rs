use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Source of grammar files.  Schemas are normally read from disk, but tests (and embedders
/// holding schemas in memory) can supply their own implementation.
pub trait Files {
    fn load(&self, name: &Path) -> io::Result<String>;
}

pub struct FsFiles;

impl Files for FsFiles {
    fn load(&self, name: &Path) -> io::Result<String> {
        let mut io = File::open(name)?;
        let mut data = String::new();
        io.read_to_string(&mut data)?;
        Ok(data)
    }
}

impl<F: Files + ?Sized> Files for &F {
    fn load(&self, name: &Path) -> io::Result<String> {
        (**self).load(name)
    }
}
