//! Nested net graph model and the read-only provider interface
//!
//! A cactus-style alignment graph is a tree of *nets*. Each net owns its
//! boundary vertices (*ends*), its aggregate segments (*atoms*) and a list of
//! *adjacency components*, each of which wraps exactly one nested net. Ends
//! carry *end instances*: oriented occurrences with a strand, a coordinate
//! and an adjacency link to the instance they pair with.
//!
//! Everything is stored in flat arenas addressed by [`NetId`], [`EndId`] and
//! [`InstanceId`]. Nesting is strictly tree shaped; the only edges crossing
//! the tree are instance adjacencies, which are plain ids resolved through a
//! [`GraphProvider`].

use crate::error::{Corruption, Result, TreeStatsError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a net in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetId(pub usize);

/// Index of an end in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndId(pub usize);

/// Index of an end instance in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub usize);

impl fmt::Display for NetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Display for EndId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

/// Orientation under which an end instance is seen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Positive,
    Negative,
}

impl Orientation {
    pub fn reverse(self) -> Self {
        match self {
            Orientation::Positive => Orientation::Negative,
            Orientation::Negative => Orientation::Positive,
        }
    }

    fn is_negative(self) -> bool {
        self == Orientation::Negative
    }
}

/// An oriented, non-owning reference to an end instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRef {
    pub id: InstanceId,
    #[serde(default)]
    pub orientation: Orientation,
}

impl InstanceRef {
    pub fn positive(id: InstanceId) -> Self {
        Self {
            id,
            orientation: Orientation::Positive,
        }
    }

    pub fn negative(id: InstanceId) -> Self {
        Self {
            id,
            orientation: Orientation::Negative,
        }
    }

    pub fn reverse(self) -> Self {
        Self {
            id: self.id,
            orientation: self.orientation.reverse(),
        }
    }
}

/// A node of the nesting tree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Net {
    pub name: String,
    #[serde(default)]
    pub ends: Vec<EndId>,
    #[serde(default)]
    pub adjacency_components: Vec<AdjacencyComponent>,
    #[serde(default)]
    pub atoms: Vec<Atom>,
}

impl Net {
    /// A net without adjacency components is a leaf of the nesting tree
    pub fn is_leaf(&self) -> bool {
        self.adjacency_components.is_empty()
    }

    pub fn adjacency_component_number(&self) -> usize {
        self.adjacency_components.len()
    }
}

/// Wrapper tying a parent net to exactly one nested net
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjacencyComponent {
    pub nested_net: NetId,
}

/// Boundary vertex at which contained sequence begins or ends
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct End {
    /// Ends bounding an atom are excluded from sequence pairing
    #[serde(default)]
    pub atom_end: bool,
    #[serde(default)]
    pub instances: Vec<InstanceRef>,
}

/// One occurrence of an end, stored in positive orientation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndInstance {
    pub end: EndId,
    pub side: bool,
    pub strand: bool,
    pub coordinate: i64,
    #[serde(default)]
    pub adjacency: Option<InstanceRef>,
}

/// Aggregate segment: `instance_number` copies of `length` bases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Atom {
    pub length: u64,
    pub instance_number: u64,
}

impl Atom {
    pub fn new(length: u64, instance_number: u64) -> Self {
        Self {
            length,
            instance_number,
        }
    }
}

/// An end instance seen under a particular orientation.
///
/// Flipping orientation flips the side and strand flags and reverses the
/// adjacency reference; the coordinate is shared by both orientations.
#[derive(Debug, Clone, Copy)]
pub struct EndInstanceView<'g> {
    id: InstanceId,
    orientation: Orientation,
    record: &'g EndInstance,
}

impl<'g> EndInstanceView<'g> {
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// The same instance seen in positive orientation
    pub fn positive_orientation(self) -> Self {
        Self {
            orientation: Orientation::Positive,
            ..self
        }
    }

    pub fn side(&self) -> bool {
        self.record.side ^ self.orientation.is_negative()
    }

    pub fn strand(&self) -> bool {
        self.record.strand ^ self.orientation.is_negative()
    }

    pub fn coordinate(&self) -> i64 {
        self.record.coordinate
    }

    pub fn adjacency(&self) -> Option<InstanceRef> {
        self.record.adjacency.map(|adjacent| {
            if self.orientation.is_negative() {
                adjacent.reverse()
            } else {
                adjacent
            }
        })
    }
}

/// Read-only access to a nested net graph.
///
/// Iteration order of every collection handed out must be stable for an
/// unmodified graph; the statistics sum floating point values in that order.
pub trait GraphProvider: Sync {
    fn net(&self, id: NetId) -> Option<&Net>;

    fn end(&self, id: EndId) -> Option<&End>;

    fn end_instance(&self, id: InstanceId) -> Option<&EndInstance>;

    fn require_net(&self, id: NetId) -> Result<&Net> {
        self.net(id)
            .ok_or_else(|| Corruption::DanglingNet(id).into())
    }

    fn require_end(&self, id: EndId) -> Result<&End> {
        self.end(id)
            .ok_or_else(|| Corruption::DanglingEnd(id).into())
    }

    /// Resolve an oriented reference into a view of the instance
    fn resolve(&self, reference: InstanceRef) -> Result<EndInstanceView<'_>> {
        let record = self
            .end_instance(reference.id)
            .ok_or(Corruption::DanglingInstance(reference.id))?;
        Ok(EndInstanceView {
            id: reference.id,
            orientation: reference.orientation,
            record,
        })
    }
}

/// In-memory arena graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetGraph {
    #[serde(default)]
    nets: Vec<Net>,
    #[serde(default)]
    ends: Vec<End>,
    #[serde(default)]
    instances: Vec<EndInstance>,
}

impl GraphProvider for NetGraph {
    fn net(&self, id: NetId) -> Option<&Net> {
        self.nets.get(id.0)
    }

    fn end(&self, id: EndId) -> Option<&End> {
        self.ends.get(id.0)
    }

    fn end_instance(&self, id: InstanceId) -> Option<&EndInstance> {
        self.instances.get(id.0)
    }
}

impl NetGraph {
    pub fn net_count(&self) -> usize {
        self.nets.len()
    }

    pub fn end_count(&self) -> usize {
        self.ends.len()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Iterate `(id, net)` pairs in arena order
    pub fn nets(&self) -> impl Iterator<Item = (NetId, &Net)> {
        self.nets.iter().enumerate().map(|(i, net)| (NetId(i), net))
    }

    /// First net with the given name
    pub fn net_by_name(&self, name: &str) -> Option<NetId> {
        self.nets().find(|(_, net)| net.name == name).map(|(id, _)| id)
    }

    /// Nets that are not nested in any adjacency component
    pub fn roots(&self) -> Vec<NetId> {
        let parents = self.parents_unchecked();
        parents
            .iter()
            .enumerate()
            .filter(|(_, parent)| parent.is_none())
            .map(|(i, _)| NetId(i))
            .collect()
    }

    fn parents_unchecked(&self) -> Vec<Option<NetId>> {
        let mut parents = vec![None; self.nets.len()];
        for (id, net) in self.nets() {
            for component in &net.adjacency_components {
                if let Some(slot) = parents.get_mut(component.nested_net.0) {
                    *slot = Some(id);
                }
            }
        }
        parents
    }

    /// Check index bounds and that nesting is a forest.
    pub fn validate(&self) -> Result<()> {
        let mut parents: Vec<Option<NetId>> = vec![None; self.nets.len()];

        for (id, net) in self.nets() {
            for &end in &net.ends {
                self.require_end(end)?;
            }
            for component in &net.adjacency_components {
                let child = component.nested_net;
                let slot = parents
                    .get_mut(child.0)
                    .ok_or(Corruption::DanglingNet(child))?;
                if slot.is_some() {
                    return Err(Corruption::MultipleParents(child).into());
                }
                *slot = Some(id);
            }
        }

        for end in &self.ends {
            for &reference in &end.instances {
                self.resolve(reference)?;
            }
        }

        for instance in &self.instances {
            self.require_end(instance.end)?;
            if let Some(adjacent) = instance.adjacency {
                self.resolve(adjacent)?;
            }
        }

        check_acyclic(&parents)
    }
}

/// With at most one parent per net, a cycle is a parent chain that returns
/// to a net already on the current walk.
fn check_acyclic(parents: &[Option<NetId>]) -> Result<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        OnWalk,
        Done,
    }

    let mut marks = vec![Mark::Unvisited; parents.len()];
    let mut walk = Vec::new();

    for start in 0..parents.len() {
        let mut current = Some(NetId(start));
        while let Some(net) = current {
            match marks[net.0] {
                Mark::Done => break,
                Mark::OnWalk => return Err(Corruption::NestingCycle(net).into()),
                Mark::Unvisited => {
                    marks[net.0] = Mark::OnWalk;
                    walk.push(net);
                    current = parents[net.0];
                }
            }
        }
        for net in walk.drain(..) {
            marks[net.0] = Mark::Done;
        }
    }
    Ok(())
}

/// Incremental construction of a [`NetGraph`].
///
/// Invalid ids are remembered and reported by [`NetGraphBuilder::build`],
/// which also runs [`NetGraph::validate`].
#[derive(Debug, Default)]
pub struct NetGraphBuilder {
    graph: NetGraph,
    error: Option<Corruption>,
}

impl NetGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_net(&mut self, name: impl Into<String>) -> NetId {
        self.graph.nets.push(Net {
            name: name.into(),
            ..Default::default()
        });
        NetId(self.graph.nets.len() - 1)
    }

    /// Nest `child` inside `parent` through a new adjacency component
    pub fn nest(&mut self, parent: NetId, child: NetId) -> &mut Self {
        if let Some(net) = self.net_mut(parent) {
            net.adjacency_components.push(AdjacencyComponent { nested_net: child });
        }
        self
    }

    pub fn add_atom(&mut self, net: NetId, length: u64, instance_number: u64) -> &mut Self {
        if let Some(net) = self.net_mut(net) {
            net.atoms.push(Atom::new(length, instance_number));
        }
        self
    }

    pub fn add_end(&mut self, net: NetId, atom_end: bool) -> EndId {
        let id = EndId(self.graph.ends.len());
        self.graph.ends.push(End {
            atom_end,
            instances: Vec::new(),
        });
        if let Some(net) = self.net_mut(net) {
            net.ends.push(id);
        }
        id
    }

    pub fn add_instance(&mut self, end: EndId, side: bool, strand: bool, coordinate: i64) -> InstanceId {
        self.add_oriented_instance(end, Orientation::Positive, side, strand, coordinate)
    }

    /// Add an instance whose flags describe its positive orientation, listed
    /// on `end` under `orientation`.
    pub fn add_oriented_instance(
        &mut self,
        end: EndId,
        orientation: Orientation,
        side: bool,
        strand: bool,
        coordinate: i64,
    ) -> InstanceId {
        let id = InstanceId(self.graph.instances.len());
        self.graph.instances.push(EndInstance {
            end,
            side,
            strand,
            coordinate,
            adjacency: None,
        });
        match self.graph.ends.get_mut(end.0) {
            Some(slot) => slot.instances.push(InstanceRef { id, orientation }),
            None => self.record(Corruption::DanglingEnd(end)),
        }
        id
    }

    /// Pair two instances with each other, both in positive orientation
    pub fn link(&mut self, a: InstanceId, b: InstanceId) -> &mut Self {
        self.set_adjacency(a, InstanceRef::positive(b));
        self.set_adjacency(b, InstanceRef::positive(a));
        self
    }

    /// Point `instance` at `target` without touching the reverse link
    pub fn set_adjacency(&mut self, instance: InstanceId, target: InstanceRef) -> &mut Self {
        match self.graph.instances.get_mut(instance.0) {
            Some(record) => record.adjacency = Some(target),
            None => self.record(Corruption::DanglingInstance(instance)),
        }
        self
    }

    /// Add two non-atom ends to `net` whose instances pair over
    /// `stop - start - 1` bases on the positive strand.
    pub fn add_pairing(&mut self, net: NetId, start: i64, stop: i64) -> (InstanceId, InstanceId) {
        let left = self.add_end(net, false);
        let right = self.add_end(net, false);
        let a = self.add_instance(left, false, true, start);
        let b = self.add_instance(right, true, true, stop);
        self.link(a, b);
        (a, b)
    }

    pub fn build(self) -> Result<NetGraph> {
        if let Some(corruption) = self.error {
            return Err(TreeStatsError::GraphCorruption(corruption));
        }
        self.graph.validate()?;
        Ok(self.graph)
    }

    fn net_mut(&mut self, id: NetId) -> Option<&mut Net> {
        if id.0 >= self.graph.nets.len() {
            self.record(Corruption::DanglingNet(id));
            return None;
        }
        self.graph.nets.get_mut(id.0)
    }

    fn record(&mut self, corruption: Corruption) {
        self.error.get_or_insert(corruption);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_layout() {
        let mut builder = NetGraphBuilder::new();
        let root = builder.add_net("root");
        let child = builder.add_net("child");
        builder.nest(root, child).add_atom(root, 10, 2);
        let (a, b) = builder.add_pairing(child, 0, 9);
        let graph = builder.build().unwrap();

        assert_eq!(graph.net_count(), 2);
        assert_eq!(graph.end_count(), 2);
        assert_eq!(graph.instance_count(), 2);
        assert!(!graph.net(root).unwrap().is_leaf());
        assert!(graph.net(child).unwrap().is_leaf());
        assert_eq!(graph.net_by_name("child"), Some(child));
        assert_eq!(graph.roots(), vec![root]);

        let view = graph.resolve(InstanceRef::positive(a)).unwrap();
        assert_eq!(view.adjacency(), Some(InstanceRef::positive(b)));
    }

    #[test]
    fn test_orientation_flips_flags() {
        let mut builder = NetGraphBuilder::new();
        let net = builder.add_net("leaf");
        let end = builder.add_end(net, false);
        let a = builder.add_instance(end, false, true, 5);
        let b = builder.add_instance(end, true, true, 7);
        builder.link(a, b);
        let graph = builder.build().unwrap();

        let negative = graph.resolve(InstanceRef::negative(a)).unwrap();
        assert!(negative.side());
        assert!(!negative.strand());
        assert_eq!(negative.coordinate(), 5);
        assert_eq!(negative.adjacency(), Some(InstanceRef::negative(b)));

        let positive = negative.positive_orientation();
        assert!(!positive.side());
        assert!(positive.strand());
        assert_eq!(positive.adjacency(), Some(InstanceRef::positive(b)));
    }

    #[test]
    fn test_multiple_parents_rejected() {
        let mut builder = NetGraphBuilder::new();
        let a = builder.add_net("a");
        let b = builder.add_net("b");
        let shared = builder.add_net("shared");
        builder.nest(a, shared).nest(b, shared);

        match builder.build() {
            Err(TreeStatsError::GraphCorruption(Corruption::MultipleParents(net))) => {
                assert_eq!(net, shared)
            }
            other => panic!("expected MultipleParents, got {:?}", other),
        }
    }

    #[test]
    fn test_nesting_cycle_rejected() {
        let mut builder = NetGraphBuilder::new();
        let a = builder.add_net("a");
        let b = builder.add_net("b");
        builder.nest(a, b).nest(b, a);

        assert!(matches!(
            builder.build(),
            Err(TreeStatsError::GraphCorruption(Corruption::NestingCycle(_)))
        ));
    }

    #[test]
    fn test_dangling_ids_rejected() {
        let mut builder = NetGraphBuilder::new();
        let a = builder.add_net("a");
        builder.nest(a, NetId(9));
        assert!(matches!(
            builder.build(),
            Err(TreeStatsError::GraphCorruption(Corruption::DanglingNet(NetId(9))))
        ));

        let mut builder = NetGraphBuilder::new();
        builder.add_atom(NetId(3), 1, 1);
        assert!(matches!(
            builder.build(),
            Err(TreeStatsError::GraphCorruption(Corruption::DanglingNet(NetId(3))))
        ));
    }

    #[test]
    fn test_serde_roundtrip_keeps_order() {
        let mut builder = NetGraphBuilder::new();
        let root = builder.add_net("root");
        for i in 0..3 {
            let child = builder.add_net(format!("c{}", i));
            builder.nest(root, child);
        }
        let graph = builder.build().unwrap();

        let json = serde_json::to_string(&graph).unwrap();
        let restored: NetGraph = serde_json::from_str(&json).unwrap();
        restored.validate().unwrap();

        let names: Vec<&str> = restored
            .net(root)
            .unwrap()
            .adjacency_components
            .iter()
            .map(|c| restored.net(c.nested_net).unwrap().name.as_str())
            .collect();
        assert_eq!(names, vec!["c0", "c1", "c2"]);
    }
}
