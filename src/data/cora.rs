//! Cora citation dataset loader
//!
//! Reads the tab-separated `cora.content` / `cora.cites` pair:
//!
//! ```text
//! cora.content: <paper_id> <word_1> ... <word_1433> <class_label>
//! cora.cites:   <cited_paper_id> <citing_paper_id>
//! ```
//!
//! Files are cached under `<root>/raw/` and downloaded on first use.

use std::collections::{BTreeSet, HashMap};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use ndarray::Array2;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use super::split::planetoid_split;
use super::Dataset;
use crate::config::SplitConfig;
use crate::error::{Error, Result};
use crate::graph::SparseGraph;

/// Default location of the raw Cora files
pub const CORA_BASE_URL: &str = "https://raw.githubusercontent.com/tkipf/pygcn/master/data/cora";

const CONTENT_FILE: &str = "cora.content";
const CITES_FILE: &str = "cora.cites";

/// Parsed raw files before splitting
#[derive(Debug, Clone)]
pub struct RawCora {
    pub features: Array2<f64>,
    pub labels: Vec<usize>,
    pub class_names: Vec<String>,
    /// Directed `(citing, cited)` edges over node indices
    pub edges: Vec<(usize, usize)>,
}

/// Loader for the Cora citation graph
pub struct CoraLoader {
    root: PathBuf,
    base_url: String,
}

impl CoraLoader {
    /// Create a loader caching files under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            base_url: CORA_BASE_URL.to_string(),
        }
    }

    /// Download from a different mirror
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Directory holding the raw files
    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("raw")
    }

    /// Load the dataset, downloading it first if needed
    pub fn load(&self, split: &SplitConfig, rng: &mut StdRng) -> Result<Dataset> {
        self.ensure_downloaded()?;

        let raw_dir = self.raw_dir();
        let raw = Self::parse(
            File::open(raw_dir.join(CONTENT_FILE))?,
            File::open(raw_dir.join(CITES_FILE))?,
        )?;

        Self::into_dataset(raw, split, rng)
    }

    /// Fetch any missing raw file
    pub fn ensure_downloaded(&self) -> Result<()> {
        let raw_dir = self.raw_dir();
        fs::create_dir_all(&raw_dir)?;

        for name in [CONTENT_FILE, CITES_FILE] {
            let path = raw_dir.join(name);
            if path.exists() {
                debug!("Using cached {}", path.display());
                continue;
            }
            let url = format!("{}/{}", self.base_url.trim_end_matches('/'), name);
            download(&url, &path)?;
        }
        Ok(())
    }

    /// Parse the content and citation files
    pub fn parse(content: impl Read, cites: impl Read) -> Result<RawCora> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_reader(content);

        let mut ids: HashMap<String, usize> = HashMap::new();
        let mut rows: Vec<Vec<f64>> = Vec::new();
        let mut raw_labels: Vec<String> = Vec::new();

        for (line, record) in reader.records().enumerate() {
            let record = record?;
            if record.len() < 3 {
                return Err(Error::Parse(format!(
                    "line {} of {}: expected id, features and label, got {} fields",
                    line + 1,
                    CONTENT_FILE,
                    record.len()
                )));
            }

            let id = record[0].trim().to_string();
            if ids.insert(id.clone(), rows.len()).is_some() {
                return Err(Error::Parse(format!("duplicate paper id {}", id)));
            }

            let features = (1..record.len() - 1)
                .map(|k| {
                    record[k].trim().parse::<f64>().map_err(|e| {
                        Error::Parse(format!("line {} field {}: {}", line + 1, k, e))
                    })
                })
                .collect::<Result<Vec<f64>>>()?;

            rows.push(features);
            raw_labels.push(record[record.len() - 1].trim().to_string());
        }

        if rows.is_empty() {
            return Err(Error::InvalidDataset(format!("{} is empty", CONTENT_FILE)));
        }

        let num_features = rows[0].len();
        let features = Array2::from_shape_vec((rows.len(), num_features), rows.concat())
            .map_err(|e| Error::Parse(format!("feature matrix: {}", e)))?;

        let class_names: Vec<String> = raw_labels
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let class_index: HashMap<&str, usize> = class_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        let labels = raw_labels.iter().map(|name| class_index[name.as_str()]).collect();

        let mut cites_reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_reader(cites);

        let mut edges = Vec::new();
        let mut skipped = 0usize;
        for record in cites_reader.records() {
            let record = record?;
            if record.len() != 2 {
                return Err(Error::Parse(format!(
                    "{}: expected 2 fields, got {}",
                    CITES_FILE,
                    record.len()
                )));
            }
            match (ids.get(record[0].trim()), ids.get(record[1].trim())) {
                (Some(&cited), Some(&citing)) => edges.push((citing, cited)),
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!("Skipped {} citations referencing unknown papers", skipped);
        }

        Ok(RawCora {
            features,
            labels,
            class_names,
            edges,
        })
    }

    /// Symmetrise the graph and attach the split
    pub fn into_dataset(raw: RawCora, split: &SplitConfig, rng: &mut StdRng) -> Result<Dataset> {
        let n = raw.features.nrows();
        let graph = SparseGraph::from_edge_index(n, &raw.edges)?.make_symmetric();
        let masks = planetoid_split(&raw.labels, raw.class_names.len(), split, rng)?;

        let dataset = Dataset {
            name: "Cora".to_string(),
            features: raw.features,
            graph,
            labels: raw.labels,
            class_names: raw.class_names,
            train_mask: masks.train,
            val_mask: masks.val,
            test_mask: masks.test,
        };
        dataset.validate()?;

        info!("Loaded {}", dataset.summary());
        Ok(dataset)
    }
}

/// Download `url` to `path`
fn download(url: &str, path: &Path) -> Result<()> {
    info!("Downloading {}", url);

    let response = reqwest::blocking::get(url)?.error_for_status()?;
    let bytes = response.bytes()?;

    // Write to a temporary name first so an interrupted download is not cached
    let partial = path.with_extension("part");
    fs::write(&partial, &bytes)?;
    fs::rename(&partial, path)?;

    info!("Saved {} bytes to {}", bytes.len(), path.display());
    Ok(())
}
