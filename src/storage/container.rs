//! Reading and writing group/dataset container files.

use super::report::ConventionReport;
use super::{
    dataset_key, split_key, DataFileError, Result, FORMAT_NAME, FORMAT_VERSION, ROOT_GROUP,
};
use crate::data::{is_valid_name, NamedData};
use crate::layout::{LayoutError, ShapeTemplate, TensorLayout};
use ndarray::{ArrayD, IxDyn};
use safetensors::tensor::{SafeTensors, TensorView};
use safetensors::{serialize_to_file, Dtype};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// Writing

/// Collects groups of datasets and writes them as one file.
#[derive(Debug, Default)]
pub struct DataFileWriter {
    groups: BTreeMap<String, BTreeMap<String, ArrayD<f32>>>,
    metadata: BTreeMap<String, String>,
}

impl DataFileWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a free-form metadata entry. The `format`, `version` and `layout`
    /// entries are reserved and always overwritten on write.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Adds `array` as dataset `name` of `group`.
    pub fn add_dataset(&mut self, group: &str, name: &str, array: ArrayD<f32>) -> Result<&mut Self> {
        if group != ROOT_GROUP && !is_valid_name(group) {
            return Err(DataFileError::InvalidName(group.to_string()));
        }
        if !is_valid_name(name) {
            return Err(DataFileError::InvalidName(name.to_string()));
        }

        let datasets = self.groups.entry(group.to_string()).or_default();
        if datasets.contains_key(name) {
            return Err(DataFileError::DuplicateDataset {
                group: group.to_string(),
                name: name.to_string(),
            });
        }
        datasets.insert(name.to_string(), array);
        Ok(self)
    }

    /// Handle for adding several datasets to one group.
    pub fn group(&mut self, name: &str) -> Result<GroupWriter<'_>> {
        if name != ROOT_GROUP && !is_valid_name(name) {
            return Err(DataFileError::InvalidName(name.to_string()));
        }
        Ok(GroupWriter {
            writer: self,
            group: name.to_string(),
        })
    }

    /// Adds every array of `data` to `group`.
    pub fn add_group(&mut self, group: &str, data: &NamedData) -> Result<&mut Self> {
        for (name, array) in data.iter() {
            self.add_dataset(group, name, array.clone())?;
        }
        Ok(self)
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        let mut keys = Vec::new();
        let mut bytes = Vec::new();
        let mut shapes = Vec::new();
        for (group, datasets) in &self.groups {
            for (name, array) in datasets {
                keys.push(dataset_key(group, name));
                bytes.push(array.iter().flat_map(|x| x.to_le_bytes()).collect::<Vec<u8>>());
                shapes.push(array.shape().to_vec());
            }
        }

        let mut views = Vec::with_capacity(keys.len());
        for ((key, data), shape) in keys.iter().zip(&bytes).zip(shapes) {
            views.push((key.as_str(), TensorView::new(Dtype::F32, shape, data)?));
        }

        let mut metadata: HashMap<String, String> = self.metadata.clone().into_iter().collect();
        metadata.insert("format".to_string(), FORMAT_NAME.to_string());
        metadata.insert("version".to_string(), FORMAT_VERSION.to_string());
        metadata.insert("layout".to_string(), ShapeTemplate::any().to_string());

        serialize_to_file(views, &Some(metadata), path)?;
        info!(
            "Wrote {} datasets in {} groups to {}",
            keys.len(),
            self.groups.len(),
            path.display()
        );
        Ok(())
    }
}

/// Adds datasets to one group of a [`DataFileWriter`].
pub struct GroupWriter<'a> {
    writer: &'a mut DataFileWriter,
    group: String,
}

impl GroupWriter<'_> {
    pub fn create_dataset(&mut self, name: &str, array: ArrayD<f32>) -> Result<&mut Self> {
        self.writer.add_dataset(&self.group, name, array)?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.group
    }
}

// Reading

/// Shape and stored type of one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetInfo {
    pub name: String,
    pub shape: Vec<usize>,
    pub dtype: Dtype,
}

impl DatasetInfo {
    pub fn layout(&self) -> std::result::Result<TensorLayout, LayoutError> {
        TensorLayout::from_shape(&self.shape)
    }
}

/// A container file opened for reading.
///
/// The whole file is read into memory on open; datasets are decoded to
/// `f32` on access.
pub struct DataFile {
    path: PathBuf,
    buffer: Vec<u8>,
    groups: BTreeMap<String, BTreeMap<String, DatasetInfo>>,
    metadata: BTreeMap<String, String>,
}

impl DataFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;

        let (_, header) = SafeTensors::read_metadata(&buffer)?;
        let metadata: BTreeMap<String, String> = header
            .metadata()
            .clone()
            .map(|m| m.into_iter().collect())
            .unwrap_or_default();

        let mut groups: BTreeMap<String, BTreeMap<String, DatasetInfo>> = BTreeMap::new();
        for (key, tensor) in header.tensors() {
            let (group, name) = split_key(&key);
            groups.entry(group.to_string()).or_default().insert(
                name.to_string(),
                DatasetInfo {
                    name: name.to_string(),
                    shape: tensor.shape.clone(),
                    dtype: tensor.dtype,
                },
            );
        }

        match metadata.get("format").map(String::as_str) {
            Some(FORMAT_NAME) => {}
            other => warn!(
                "{}: format is {:?}, expected '{}'; reading it anyway",
                path.display(),
                other,
                FORMAT_NAME
            ),
        }
        info!("Opened {} ({} groups)", path.display(), groups.len());

        Ok(Self {
            path: path.to_path_buf(),
            buffer,
            groups,
            metadata,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Group names, sorted. The root group is `""`.
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn contains_group(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    pub fn group(&self, name: &str) -> Result<Group<'_>> {
        let (name, datasets) =
            self.groups
                .get_key_value(name)
                .ok_or_else(|| DataFileError::GroupNotFound {
                    group: name.to_string(),
                    available: self.groups.keys().cloned().collect(),
                })?;
        Ok(Group {
            file: self,
            name,
            datasets,
        })
    }

    /// Checks every group against the `(T, B, ...)` convention.
    pub fn check_conventions(&self) -> Vec<ConventionReport> {
        self.groups
            .iter()
            .map(|(group, datasets)| {
                let mut report = ConventionReport::new(group.as_str());
                for (name, info) in datasets {
                    report.add(name.as_str(), &info.shape);
                }
                if !report.is_valid() {
                    warn!("{}: {}", self.path.display(), report);
                }
                report
            })
            .collect()
    }

    fn read_dataset(&self, group: &str, info: &DatasetInfo) -> Result<ArrayD<f32>> {
        let tensors = SafeTensors::deserialize(&self.buffer)?;
        let view = tensors.tensor(&dataset_key(group, &info.name))?;
        let values = decode(&info.name, view.dtype(), view.data())?;

        let actual = values.len();
        ArrayD::from_shape_vec(IxDyn(&info.shape), values).map_err(|_| {
            DataFileError::ShapeMismatch {
                name: info.name.clone(),
                expected: info.shape.clone(),
                actual,
            }
        })
    }
}

impl fmt::Debug for DataFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataFile")
            .field("path", &self.path)
            .field("bytes", &self.buffer.len())
            .field("groups", &self.groups)
            .field("metadata", &self.metadata)
            .finish()
    }
}

fn decode(name: &str, dtype: Dtype, data: &[u8]) -> Result<Vec<f32>> {
    let values = match dtype {
        Dtype::F32 => data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
        Dtype::F64 => data
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]) as f32)
            .collect(),
        Dtype::I32 => data
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f32)
            .collect(),
        Dtype::U8 => data.iter().map(|&b| f32::from(b)).collect(),
        other => {
            return Err(DataFileError::UnsupportedDtype {
                name: name.to_string(),
                dtype: format!("{other:?}"),
            })
        }
    };
    Ok(values)
}

/// One group of an open [`DataFile`].
#[derive(Debug, Clone, Copy)]
pub struct Group<'a> {
    file: &'a DataFile,
    name: &'a str,
    datasets: &'a BTreeMap<String, DatasetInfo>,
}

impl<'a> Group<'a> {
    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn dataset_names(&self) -> impl Iterator<Item = &'a str> {
        self.datasets.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.datasets.contains_key(name)
    }

    pub fn info(&self, name: &str) -> Result<&'a DatasetInfo> {
        self.datasets
            .get(name)
            .ok_or_else(|| DataFileError::DatasetNotFound {
                group: self.name.to_string(),
                name: name.to_string(),
            })
    }

    pub fn shape(&self, name: &str) -> Result<&'a [usize]> {
        Ok(&self.info(name)?.shape)
    }

    /// Reads one dataset as `f32`.
    pub fn dataset(&self, name: &str) -> Result<ArrayD<f32>> {
        let info = self.info(name)?;
        debug!("Reading dataset '{}' of group '{}'", name, self.name);
        self.file.read_dataset(self.name, info)
    }

    /// Reads all datasets of the group as validated [`NamedData`].
    pub fn load(&self) -> Result<NamedData> {
        let names: Vec<&str> = self.dataset_names().collect();
        self.load_only(&names)
    }

    /// Reads the listed datasets as validated [`NamedData`].
    pub fn load_only(&self, names: &[&str]) -> Result<NamedData> {
        let mut arrays = Vec::with_capacity(names.len());
        for &name in names {
            arrays.push((name, self.dataset(name)?));
        }
        Ok(NamedData::new(arrays)?)
    }

    pub fn report(&self) -> ConventionReport {
        let mut report = ConventionReport::new(self.name);
        for (name, info) in self.datasets {
            report.add(name.as_str(), &info.shape);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("seqfeed_{}_{}.safetensors", name, std::process::id()))
    }

    #[test]
    fn test_writer_rejects_bad_names() {
        let mut writer = DataFileWriter::new();
        let a = ArrayD::zeros(IxDyn(&[1, 2, 1]));
        assert!(matches!(
            writer.add_dataset("training", "a/b", a.clone()),
            Err(DataFileError::InvalidName(_))
        ));
        assert!(matches!(
            writer.add_dataset("train/ing", "a", a.clone()),
            Err(DataFileError::InvalidName(_))
        ));
        writer.add_dataset("training", "a", a.clone()).unwrap();
        assert!(matches!(
            writer.add_dataset("training", "a", a),
            Err(DataFileError::DuplicateDataset { .. })
        ));
    }

    #[test]
    fn test_reads_other_dtypes() {
        let path = temp_path("dtypes");
        let ints: Vec<u8> = [1i32, -2, 3].iter().flat_map(|x| x.to_le_bytes()).collect();
        let doubles: Vec<u8> = [0.5f64, 1.5].iter().flat_map(|x| x.to_le_bytes()).collect();
        let bytes: Vec<u8> = vec![0, 255];
        let halves: Vec<u8> = vec![0, 0];
        let views = vec![
            ("g/ints", TensorView::new(Dtype::I32, vec![1, 3, 1], &ints).unwrap()),
            ("g/doubles", TensorView::new(Dtype::F64, vec![1, 2, 1], &doubles).unwrap()),
            ("g/bytes", TensorView::new(Dtype::U8, vec![1, 2, 1], &bytes).unwrap()),
            ("h/half", TensorView::new(Dtype::F16, vec![1, 1, 1], &halves).unwrap()),
        ];
        serialize_to_file(views, &None, &path).unwrap();

        let file = DataFile::open(&path).unwrap();
        let g = file.group("g").unwrap();
        assert_eq!(g.dataset("ints").unwrap().iter().copied().collect::<Vec<_>>(), vec![1.0, -2.0, 3.0]);
        assert_eq!(g.dataset("doubles").unwrap().iter().copied().collect::<Vec<_>>(), vec![0.5, 1.5]);
        assert_eq!(g.dataset("bytes").unwrap().iter().copied().collect::<Vec<_>>(), vec![0.0, 255.0]);
        assert!(matches!(
            file.group("h").unwrap().dataset("half"),
            Err(DataFileError::UnsupportedDtype { .. })
        ));
        assert!(file.metadata().is_empty());

        std::fs::remove_file(&path).ok();
    }
}
