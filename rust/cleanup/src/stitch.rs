// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Edge-provenance stitching of resolved loops back into a scratch DTM.
//!
//! A resolved loop is snapped onto the network it came from and cut into
//! runs of consecutive edges owned by the same source feature. Each run is
//! stored as a tagged breakline whose provenance is `Merged(source)`.

use std::collections::BTreeSet;

use dtm_lite_geometry::polygon::make_anticlockwise;
use dtm_lite_tin::{Dtm, FeatureId, FeatureProvenance, FeatureType, TinNetwork};
use nalgebra::Point3;

use crate::error::{Error, Result};

/// Store `ring` into `dtm` as provenance-tagged runs. `used` is the set of
/// contributing features, its smallest member being the fallback owner of
/// edges no feature claims. Returns the number of runs stored.
pub fn store_with_provenance(
    dtm: &mut Dtm,
    network: &TinNetwork,
    used: &BTreeSet<usize>,
    ring: &mut [Point3<f64>],
    tagged: FeatureType,
) -> Result<usize> {
    if ring.len() < 2 {
        return Ok(0);
    }
    make_anticlockwise(ring);

    let mut mesh = Vec::with_capacity(ring.len());
    for point in ring.iter_mut() {
        let p = network
            .closest_point(point.x, point.y)
            .ok_or_else(|| Error::Invariant("stitching onto an empty network".to_string()))?;
        point.z = network.point(p).z;
        mesh.push(p);
    }

    let mut stored = 0;
    let mut start = 0;
    let mut current: Option<FeatureId> = None;
    for i in 1..ring.len() {
        let (a, b) = (mesh[i - 1], mesh[i]);
        if a == b {
            continue;
        }
        let source = link_source(dtm, network, used, a, b)?;
        if current != Some(source) {
            if let Some(previous) = current {
                stored += flush(dtm, &ring[start..i], previous, tagged)?;
            }
            start = i - 1;
            current = Some(source);
        }
    }
    if let Some(previous) = current {
        stored += flush(dtm, &ring[start..], previous, tagged)?;
    }
    Ok(stored)
}

/// Source feature id of the feature owning the link `a - b`.
fn link_source(dtm: &Dtm, network: &TinNetwork, used: &BTreeSet<usize>, a: usize, b: usize) -> Result<FeatureId> {
    let owner = network.first_feature_on_link(a, b).or_else(|| {
        network
            .collinear_path(a, b)
            .and_then(|path| network.first_feature_on_link(path[0], path[1]))
    });

    let owner = match owner {
        Some(owner) => owner,
        None => {
            let fallback = used.first().copied().ok_or_else(|| {
                Error::Invariant(format!("link {a}-{b} has no owner and no contributing feature"))
            })?;
            tracing::warn!(a, b, fallback, "no feature owns link, using first contributing feature");
            fallback
        }
    };

    dtm.feature(owner)
        .map(|f| f.provenance.source())
        .ok_or(Error::Tin(dtm_lite_tin::Error::FeatureNotFound(owner)))
}

fn flush(dtm: &mut Dtm, run: &[Point3<f64>], source: FeatureId, tagged: FeatureType) -> Result<usize> {
    if run.len() < 2 {
        return Ok(0);
    }
    dtm.store_derived_feature(
        FeatureType::Breakline,
        tagged.code(),
        None,
        FeatureProvenance::Merged(source),
        run,
    )?;
    Ok(1)
}
