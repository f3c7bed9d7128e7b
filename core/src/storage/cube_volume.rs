use crate::prelude::{CubeDims, FilterError, FilterResult};
use crate::processing::tiling::{Tile, TileGrid};
use log::{debug, warn};
use memmap2::MmapMut;
use ndarray::{Array2, ArrayView2, ArrayViewMut3, Axis};
use num_complex::Complex32;
use std::fs::{self, OpenOptions};
use std::mem::size_of;
use std::path::{Path, PathBuf};

/// Disk-backed `(time, y, x)` array of single-precision complex values.
///
/// The backing file is memory-mapped; element `(t, y, x)` lives at byte
/// offset `((t * H + y) * W + x) * 8`. The file is removed when the volume
/// is dropped.
pub struct CubeVolume {
    path: PathBuf,
    dims: CubeDims,
    mmap: Option<MmapMut>,
}

impl CubeVolume {
    pub fn create(path: impl AsRef<Path>, dims: CubeDims) -> FilterResult<Self> {
        let path = path.as_ref().to_path_buf();
        let bytes = (dims.len() as u64)
            .checked_mul(size_of::<Complex32>() as u64)
            .ok_or_else(|| {
                FilterError::ResourceExhaustion(format!("cube {:?} overflows a file size", dims))
            })?;

        let exhausted = |stage: &str, err: std::io::Error| {
            FilterError::ResourceExhaustion(format!(
                "{} backing file {} ({} bytes): {}",
                stage,
                path.display(),
                bytes,
                err
            ))
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|err| exhausted("creating", err))?;
        file.set_len(bytes)
            .map_err(|err| exhausted("sizing", err))?;

        // SAFETY: the file is private to this run's scratch directory and is
        // neither resized nor written through any other handle while mapped.
        let mmap = unsafe { MmapMut::map_mut(&file) }.map_err(|err| exhausted("mapping", err))?;
        debug!("cube volume {} mapped ({} bytes)", path.display(), bytes);

        Ok(Self {
            path,
            dims,
            mmap: Some(mmap),
        })
    }

    pub fn dims(&self) -> CubeDims {
        self.dims
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn elements(&self) -> &[Complex32] {
        match &self.mmap {
            Some(mmap) => bytemuck::cast_slice(&mmap[..]),
            None => &[],
        }
    }

    fn elements_mut(&mut self) -> &mut [Complex32] {
        match &mut self.mmap {
            Some(mmap) => bytemuck::cast_slice_mut(&mut mmap[..]),
            None => &mut [],
        }
    }

    /// Flat element offset of `(t, y, x)`.
    pub fn offset(&self, t: usize, y: usize, x: usize) -> usize {
        (t * self.dims.height + y) * self.dims.width + x
    }

    pub fn get(&self, t: usize, y: usize, x: usize) -> Complex32 {
        self.elements()[self.offset(t, y, x)]
    }

    pub fn set(&mut self, t: usize, y: usize, x: usize, value: Complex32) {
        let offset = self.offset(t, y, x);
        self.elements_mut()[offset] = value;
    }

    fn check_frame(&self, t: usize, shape: (usize, usize)) -> FilterResult<()> {
        if t >= self.dims.frames {
            return Err(FilterError::Configuration(format!(
                "time index {} outside cube of {} frames",
                t, self.dims.frames
            )));
        }
        if shape != self.dims.frame_shape() {
            return Err(FilterError::ShapeMismatch {
                index: t,
                expected: self.dims.frame_shape(),
                found: shape,
            });
        }
        Ok(())
    }

    pub fn write_frame(&mut self, t: usize, frame: ArrayView2<Complex32>) -> FilterResult<()> {
        self.check_frame(t, frame.dim())?;
        let frame_len = self.dims.frame_len();
        let start = t * frame_len;
        let target = &mut self.elements_mut()[start..start + frame_len];
        for (dst, src) in target.iter_mut().zip(frame.iter()) {
            *dst = *src;
        }
        Ok(())
    }

    pub fn read_frame(&self, t: usize) -> FilterResult<Array2<Complex32>> {
        self.check_frame(t, self.dims.frame_shape())?;
        let frame_len = self.dims.frame_len();
        let start = t * frame_len;
        let source = &self.elements()[start..start + frame_len];
        Array2::from_shape_vec(self.dims.frame_shape(), source.to_vec())
            .map_err(|err| FilterError::Configuration(err.to_string()))
    }

    /// The whole volume as one mutable view.
    pub fn view_mut(&mut self) -> FilterResult<ArrayViewMut3<'_, Complex32>> {
        let shape = self.dims.shape();
        let elements = self.elements_mut();
        ArrayViewMut3::from_shape(shape, elements)
            .map_err(|err| FilterError::ResourceExhaustion(format!("cube mapping: {}", err)))
    }

    /// Splits the volume into one disjoint view per tile, in grid order.
    pub fn tiles_mut(
        &mut self,
        grid: &TileGrid,
    ) -> FilterResult<Vec<(Tile, ArrayViewMut3<'_, Complex32>)>> {
        if grid.plane() != self.dims.frame_shape() {
            return Err(FilterError::Configuration(format!(
                "tile grid covers {:?}, cube frames are {:?}",
                grid.plane(),
                self.dims.frame_shape()
            )));
        }
        let mut views = Vec::with_capacity(grid.len());
        let mut rest = self.view_mut()?;
        for band in grid.bands() {
            let (mut band_view, remainder) = rest.split_at(Axis(1), band[0].height());
            rest = remainder;
            for tile in band {
                let (tile_view, remainder) = band_view.split_at(Axis(2), tile.width());
                band_view = remainder;
                views.push((*tile, tile_view));
            }
        }
        Ok(views)
    }

    pub fn flush(&self) -> FilterResult<()> {
        if let Some(mmap) = &self.mmap {
            mmap.flush()?;
        }
        Ok(())
    }
}

impl Drop for CubeVolume {
    fn drop(&mut self) {
        self.mmap.take();
        if let Err(err) = fs::remove_file(&self.path) {
            warn!(
                "could not remove cube volume {}: {}",
                self.path.display(),
                err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn dims(frames: usize, height: usize, width: usize) -> CubeDims {
        CubeDims {
            frames,
            height,
            width,
        }
    }

    #[test]
    fn frames_round_trip_through_the_mapping() {
        let dir = tempdir().unwrap();
        let mut cube = CubeVolume::create(dir.path().join("cube.dat"), dims(2, 2, 4)).unwrap();
        let frame = Array2::from_shape_fn((2, 4), |(y, x)| Complex32::new(y as f32, x as f32));

        cube.write_frame(1, frame.view()).unwrap();
        cube.flush().unwrap();

        assert_eq!(cube.read_frame(1).unwrap(), frame);
        assert_eq!(cube.read_frame(0).unwrap(), Array2::zeros((2, 4)));
        assert_eq!(cube.get(1, 1, 3), Complex32::new(1.0, 3.0));
        assert_eq!(cube.offset(1, 1, 3), 15);
    }

    #[test]
    fn element_writes_land_at_computed_offsets() {
        let dir = tempdir().unwrap();
        let mut cube = CubeVolume::create(dir.path().join("cube.dat"), dims(2, 2, 2)).unwrap();
        cube.set(1, 0, 1, Complex32::new(5.0, 0.0));
        assert_eq!(cube.read_frame(1).unwrap()[[0, 1]], Complex32::new(5.0, 0.0));
    }

    #[test]
    fn wrong_frame_shape_is_rejected() {
        let dir = tempdir().unwrap();
        let mut cube = CubeVolume::create(dir.path().join("cube.dat"), dims(2, 2, 2)).unwrap();
        let frame = Array2::<Complex32>::zeros((3, 2));
        assert!(matches!(
            cube.write_frame(0, frame.view()),
            Err(FilterError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn tile_views_cover_their_own_regions() {
        let dir = tempdir().unwrap();
        let mut cube = CubeVolume::create(dir.path().join("cube.dat"), dims(2, 4, 6)).unwrap();
        let grid = TileGrid::new((4, 6), (3, 4)).unwrap();

        for (tile, mut view) in cube.tiles_mut(&grid).unwrap() {
            assert_eq!(view.dim(), (2, tile.height(), tile.width()));
            let marker = (tile.y0 * 10 + tile.x0) as f32;
            view.fill(Complex32::new(marker, 0.0));
        }

        assert_eq!(cube.get(0, 2, 1).re, 0.0);
        assert_eq!(cube.get(1, 0, 5).re, 4.0);
        assert_eq!(cube.get(1, 3, 3).re, 30.0);
        assert_eq!(cube.get(0, 3, 5).re, 34.0);
    }

    #[test]
    fn dropping_the_volume_removes_its_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cube.dat");
        let cube = CubeVolume::create(&path, dims(2, 2, 2)).unwrap();
        assert!(path.exists());
        drop(cube);
        assert!(!path.exists());
    }

    #[test]
    fn unwritable_location_is_resource_exhaustion() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("cube.dat");
        assert!(matches!(
            CubeVolume::create(path, dims(2, 2, 2)),
            Err(FilterError::ResourceExhaustion(_))
        ));
    }
}
