use crate::prelude::{FilterError, FilterResult, FrameKind};
use ndarray::{Array2, ArrayView2};
use ndarray_npy::{read_npy, write_npy, ReadableElement, WritableElement};
use std::fs;
use std::path::{Path, PathBuf};

/// Width of the zero-padded index in frame file names.
const INDEX_WIDTH: usize = 6;

/// Directory-backed store of 2-D frames keyed by `(kind, index)`.
///
/// Each frame is one `.npy` file under `<root>/<kind>/`.
#[derive(Debug, Clone)]
pub struct FrameStore {
    root: PathBuf,
}

impl FrameStore {
    pub fn open(root: impl Into<PathBuf>) -> FilterResult<Self> {
        let root = root.into();
        for kind in [
            FrameKind::Raw,
            FrameKind::Forward,
            FrameKind::Inverse,
            FrameKind::Mask,
        ] {
            fs::create_dir_all(root.join(kind.dir_name()))?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, kind: FrameKind, index: usize) -> PathBuf {
        self.root
            .join(kind.dir_name())
            .join(format!("{:0width$}.npy", index, width = INDEX_WIDTH))
    }

    pub fn contains(&self, kind: FrameKind, index: usize) -> bool {
        self.path_for(kind, index).is_file()
    }

    /// Writes a frame, replacing any previous value under the same key.
    pub fn store<A: WritableElement>(
        &self,
        kind: FrameKind,
        index: usize,
        frame: ArrayView2<'_, A>,
    ) -> FilterResult<()> {
        write_npy(self.path_for(kind, index), &frame)?;
        Ok(())
    }

    pub fn load<A: ReadableElement>(&self, kind: FrameKind, index: usize) -> FilterResult<Array2<A>> {
        let path = self.path_for(kind, index);
        if !path.is_file() {
            return Err(FilterError::NotFound { kind, index });
        }
        Ok(read_npy(path)?)
    }

    /// Removes every frame of `kind`, leaving an empty directory behind.
    pub fn delete_all(&self, kind: FrameKind) -> FilterResult<()> {
        let dir = self.root.join(kind.dir_name());
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use num_complex::Complex32;
    use tempfile::tempdir;

    #[test]
    fn store_and_load_real_frame() {
        let dir = tempdir().unwrap();
        let store = FrameStore::open(dir.path()).unwrap();
        let frame = array![[1.0f32, 2.0], [3.0, 4.0]];

        store.store(FrameKind::Raw, 7, frame.view()).unwrap();
        let loaded: Array2<f32> = store.load(FrameKind::Raw, 7).unwrap();
        assert_eq!(loaded, frame);
        assert!(store.path_for(FrameKind::Raw, 7).ends_with("raw/000007.npy"));
    }

    #[test]
    fn overwrite_replaces_complex_frame() {
        let dir = tempdir().unwrap();
        let store = FrameStore::open(dir.path()).unwrap();
        let first = Array2::from_elem((2, 2), Complex32::new(1.0, 1.0));
        let second = Array2::from_elem((2, 2), Complex32::new(0.0, -3.0));

        store.store(FrameKind::Forward, 0, first.view()).unwrap();
        store.store(FrameKind::Forward, 0, second.view()).unwrap();
        let loaded: Array2<Complex32> = store.load(FrameKind::Forward, 0).unwrap();
        assert_eq!(loaded, second);
    }

    #[test]
    fn missing_key_is_not_found() {
        let dir = tempdir().unwrap();
        let store = FrameStore::open(dir.path()).unwrap();
        let result = store.load::<f32>(FrameKind::Mask, 3);
        assert!(matches!(
            result,
            Err(FilterError::NotFound {
                kind: FrameKind::Mask,
                index: 3
            })
        ));
    }

    #[test]
    fn delete_all_only_clears_one_kind() {
        let dir = tempdir().unwrap();
        let store = FrameStore::open(dir.path()).unwrap();
        let frame = array![[1.0f32]];
        store.store(FrameKind::Raw, 0, frame.view()).unwrap();
        store.store(FrameKind::Mask, 0, frame.view()).unwrap();

        store.delete_all(FrameKind::Raw).unwrap();
        assert!(!store.contains(FrameKind::Raw, 0));
        assert!(store.contains(FrameKind::Mask, 0));
    }
}
