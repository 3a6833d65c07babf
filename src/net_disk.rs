//! Read-only net disk
//!
//! A net disk locator names either a JSON document holding a serialized
//! [`NetGraph`] or a directory containing `net_disk.json`. The graph is
//! validated when the disk is opened and never modified afterwards.

use crate::error::{Corruption, Result, TreeStatsError};
use crate::graph::{End, EndId, EndInstance, GraphProvider, InstanceId, Net, NetGraph, NetId};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Document name used when the locator is a directory
pub const NET_DISK_FILE: &str = "net_disk.json";

pub struct NetDisk {
    location: PathBuf,
    graph: NetGraph,
    names: HashMap<String, NetId>,
}

impl NetDisk {
    /// Open and validate the net disk at `locator`
    pub fn open<P: AsRef<Path>>(locator: P) -> Result<Self> {
        let location = resolve_locator(locator.as_ref());
        let reader = BufReader::new(File::open(&location)?);
        let graph: NetGraph = serde_json::from_reader(reader)?;
        let disk = Self::from_graph(location, graph)?;

        info!(
            location = %disk.location.display(),
            nets = disk.graph.net_count(),
            ends = disk.graph.end_count(),
            end_instances = disk.graph.instance_count(),
            "Set up the net disk"
        );
        Ok(disk)
    }

    /// Wrap an in-memory graph, applying the same checks as [`NetDisk::open`]
    pub fn from_graph(location: PathBuf, graph: NetGraph) -> Result<Self> {
        graph.validate()?;

        let mut names = HashMap::with_capacity(graph.net_count());
        for (id, net) in graph.nets() {
            if names.insert(net.name.clone(), id).is_some() {
                return Err(Corruption::DuplicateNetName(net.name.clone()).into());
            }
        }

        Ok(Self {
            location,
            graph,
            names,
        })
    }

    /// Write `graph` as a net disk document at `locator`
    pub fn save<P: AsRef<Path>>(graph: &NetGraph, locator: P) -> Result<PathBuf> {
        let locator = locator.as_ref();
        if locator.is_dir() || locator.extension().is_none() {
            std::fs::create_dir_all(locator)?;
        }
        let location = resolve_locator(locator);

        let mut writer = BufWriter::new(File::create(&location)?);
        serde_json::to_writer_pretty(&mut writer, graph)?;
        writer.flush()?;
        Ok(location)
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn graph(&self) -> &NetGraph {
        &self.graph
    }

    /// Look up a net by its name
    pub fn net_by_name(&self, name: &str) -> Result<NetId> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| TreeStatsError::NetNotFound(name.to_string()))
    }

    /// Release the store
    pub fn close(self) {
        debug!(location = %self.location.display(), "Closed the net disk");
    }
}

impl GraphProvider for NetDisk {
    fn net(&self, id: NetId) -> Option<&Net> {
        self.graph.net(id)
    }

    fn end(&self, id: EndId) -> Option<&End> {
        self.graph.end(id)
    }

    fn end_instance(&self, id: InstanceId) -> Option<&EndInstance> {
        self.graph.end_instance(id)
    }
}

fn resolve_locator(locator: &Path) -> PathBuf {
    if locator.is_dir() || locator.extension().is_none() {
        locator.join(NET_DISK_FILE)
    } else {
        locator.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NetGraphBuilder;
    use tempfile::TempDir;

    fn small_graph() -> NetGraph {
        let mut builder = NetGraphBuilder::new();
        let root = builder.add_net("0");
        let child = builder.add_net("1");
        builder.nest(root, child).add_atom(root, 4, 2);
        builder.add_pairing(child, 0, 9);
        builder.add_pairing(root, 0, 5);
        builder.build().unwrap()
    }

    #[test]
    fn test_save_and_open_directory() {
        let temp_dir = TempDir::new().unwrap();
        let store = temp_dir.path().join("disk");
        let written = NetDisk::save(&small_graph(), &store).unwrap();
        assert_eq!(written, store.join(NET_DISK_FILE));

        let disk = NetDisk::open(&store).unwrap();
        assert_eq!(disk.net_by_name("0").unwrap(), NetId(0));
        assert_eq!(disk.net_by_name("1").unwrap(), NetId(1));
        assert!(matches!(
            disk.net_by_name("2"),
            Err(TreeStatsError::NetNotFound(_))
        ));
        assert_eq!(disk.require_net(NetId(0)).unwrap().atoms.len(), 1);
        disk.close();
    }

    #[test]
    fn test_open_document_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("graph.json");
        NetDisk::save(&small_graph(), &path).unwrap();

        let disk = NetDisk::open(&path).unwrap();
        assert_eq!(disk.location(), path.as_path());
        assert_eq!(disk.graph().net_count(), 2);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut builder = NetGraphBuilder::new();
        builder.add_net("same");
        builder.add_net("same");
        let graph = builder.build().unwrap();

        assert!(matches!(
            NetDisk::from_graph(PathBuf::from("memory"), graph),
            Err(TreeStatsError::GraphCorruption(Corruption::DuplicateNetName(_)))
        ));
    }

    #[test]
    fn test_corrupt_document_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.json");
        std::fs::write(
            &path,
            r#"{"nets": [{"name": "a", "adjacency_components": [{"nested_net": 5}]}]}"#,
        )
        .unwrap();

        assert!(matches!(
            NetDisk::open(&path),
            Err(TreeStatsError::GraphCorruption(Corruption::DanglingNet(NetId(5))))
        ));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(NetDisk::open(&path), Err(TreeStatsError::Json(_))));

        assert!(matches!(
            NetDisk::open(temp_dir.path().join("missing")),
            Err(TreeStatsError::Io(_))
        ));
    }
}
