//! Contained sequence length of a single net
//!
//! Sequence is only physically present between paired end instances. For
//! every non-atom end, each instance normalised to positive orientation with
//! its side flag unset opens a stretch that closes at its adjacency; the
//! bases strictly between the two coordinates are counted.

use crate::error::{Corruption, Result};
use crate::graph::{EndInstanceView, GraphProvider, NetId};

/// Total sequence contained directly at `net`, summed in provider order.
///
/// The value is integral but returned as `f64` because it feeds logarithms.
pub fn total_contained_sequence<G>(graph: &G, net: NetId) -> Result<f64>
where
    G: GraphProvider + ?Sized,
{
    let mut total_length = 0.0;
    for pairing in pairings(graph, net)? {
        total_length += pairing? as f64;
    }
    Ok(total_length)
}

/// Gap lengths of every opening instance of `net`, in provider order
pub fn pairings<'g, G>(graph: &'g G, net: NetId) -> Result<impl Iterator<Item = Result<i64>> + 'g>
where
    G: GraphProvider + ?Sized,
{
    let net = graph.require_net(net)?;
    let ends = net
        .ends
        .iter()
        .map(|&end| graph.require_end(end))
        .collect::<Result<Vec<_>>>()?;

    Ok(ends
        .into_iter()
        .filter(|end| !end.atom_end)
        .flat_map(|end| end.instances.iter())
        .filter_map(move |&reference| match graph.resolve(reference) {
            Ok(view) => {
                let view = view.positive_orientation();
                (!view.side()).then(|| gap_length(graph, view))
            }
            Err(e) => Some(Err(e)),
        }))
}

fn gap_length<G>(graph: &G, instance: EndInstanceView<'_>) -> Result<i64>
where
    G: GraphProvider + ?Sized,
{
    let adjacent = instance
        .adjacency()
        .ok_or(Corruption::MissingAdjacency(instance.id()))?;
    let target = graph.resolve(adjacent)?;
    if !target.strand() {
        return Err(Corruption::StrandMismatch {
            instance: instance.id(),
            target: target.id(),
        }
        .into());
    }

    let gap = target.coordinate() - instance.coordinate() - 1;
    if gap < 0 {
        return Err(Corruption::NegativeGap {
            instance: instance.id(),
            target: target.id(),
            gap,
        }
        .into());
    }
    Ok(gap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TreeStatsError;
    use crate::graph::{InstanceRef, NetGraphBuilder, Orientation};

    #[test]
    fn test_single_pairing() {
        let mut builder = NetGraphBuilder::new();
        let net = builder.add_net("leaf");
        builder.add_pairing(net, 10, 19);
        let graph = builder.build().unwrap();

        assert_eq!(total_contained_sequence(&graph, net).unwrap(), 8.0);
    }

    #[test]
    fn test_adjacent_coordinates_contain_nothing() {
        let mut builder = NetGraphBuilder::new();
        let net = builder.add_net("leaf");
        builder.add_pairing(net, 4, 5);
        builder.add_pairing(net, 20, 23);
        let graph = builder.build().unwrap();

        assert_eq!(total_contained_sequence(&graph, net).unwrap(), 2.0);
        let gaps: Vec<i64> = pairings(&graph, net).unwrap().map(|g| g.unwrap()).collect();
        assert_eq!(gaps, vec![0, 2]);
    }

    #[test]
    fn test_atom_ends_are_skipped() {
        let mut builder = NetGraphBuilder::new();
        let net = builder.add_net("leaf");
        builder.add_pairing(net, 0, 5);
        let atom_end = builder.add_end(net, true);
        let other = builder.add_end(net, true);
        let a = builder.add_instance(atom_end, false, true, 100);
        let b = builder.add_instance(other, true, true, 50);
        builder.link(a, b);
        let graph = builder.build().unwrap();

        // the atom pairing would be a negative gap if it were counted
        assert_eq!(total_contained_sequence(&graph, net).unwrap(), 4.0);
    }

    #[test]
    fn test_negative_listing_is_normalised() {
        let mut builder = NetGraphBuilder::new();
        let net = builder.add_net("leaf");
        let left = builder.add_end(net, false);
        let right = builder.add_end(net, false);
        let a = builder.add_oriented_instance(left, Orientation::Negative, false, true, 0);
        let b = builder.add_oriented_instance(right, Orientation::Negative, true, true, 6);
        builder.link(a, b);
        let graph = builder.build().unwrap();

        assert_eq!(total_contained_sequence(&graph, net).unwrap(), 5.0);
    }

    #[test]
    fn test_negative_gap_is_corruption() {
        let mut builder = NetGraphBuilder::new();
        let net = builder.add_net("leaf");
        builder.add_pairing(net, 10, 10);
        let graph = builder.build().unwrap();

        match total_contained_sequence(&graph, net) {
            Err(TreeStatsError::GraphCorruption(Corruption::NegativeGap { gap, .. })) => {
                assert_eq!(gap, -1)
            }
            other => panic!("expected NegativeGap, got {:?}", other),
        }
    }

    #[test]
    fn test_unstranded_target_is_corruption() {
        let mut builder = NetGraphBuilder::new();
        let net = builder.add_net("leaf");
        let left = builder.add_end(net, false);
        let right = builder.add_end(net, false);
        let a = builder.add_instance(left, false, true, 0);
        let b = builder.add_instance(right, true, false, 9);
        builder.link(a, b);
        let graph = builder.build().unwrap();

        assert!(matches!(
            total_contained_sequence(&graph, net),
            Err(TreeStatsError::GraphCorruption(Corruption::StrandMismatch { .. }))
        ));
    }

    #[test]
    fn test_unpaired_opening_instance_is_corruption() {
        let mut builder = NetGraphBuilder::new();
        let net = builder.add_net("leaf");
        let end = builder.add_end(net, false);
        let lonely = builder.add_instance(end, false, true, 3);
        let graph = builder.build().unwrap();

        match total_contained_sequence(&graph, net) {
            Err(TreeStatsError::GraphCorruption(Corruption::MissingAdjacency(id))) => {
                assert_eq!(id, lonely)
            }
            other => panic!("expected MissingAdjacency, got {:?}", other),
        }
    }

    #[test]
    fn test_reversed_adjacency_target() {
        // target listed through a negative reference: its strand flips
        let mut builder = NetGraphBuilder::new();
        let net = builder.add_net("leaf");
        let left = builder.add_end(net, false);
        let right = builder.add_end(net, false);
        let a = builder.add_instance(left, false, true, 0);
        let b = builder.add_instance(right, true, false, 4);
        builder.set_adjacency(a, InstanceRef::negative(b));
        builder.set_adjacency(b, InstanceRef::negative(a));
        let graph = builder.build().unwrap();

        assert_eq!(total_contained_sequence(&graph, net).unwrap(), 3.0);
    }
}
