use crate::bodies::Part;
use crate::collision::{
    safe_intersects, CandidatePair, Candidates, ColissionBuffer, ColissionLayer, ColissionMask, Colission,
    DumpTarget, IntersectionTest,
};
use crate::core::{Arena, ThreadPool};
use crate::error::PhysicsError;
use crate::Result;
use log::{debug, trace};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Everything the narrow phase reads
#[derive(Clone, Copy)]
pub struct DetectionContext<'a> {
    pub layers: &'a [ColissionLayer],
    pub mask: &'a ColissionMask,
    pub parts: &'a Arena<Part>,
    pub test: &'a dyn IntersectionTest,

    /// Where failed intersection pairs are dumped
    pub dumps: DumpTarget<'a>,
}

/// Collects broad-phase candidates over all layers and marked layer pairs
pub fn gather_candidates(layers: &[ColissionLayer], mask: &ColissionMask) -> Candidates {
    let mut candidates = Candidates::default();

    for layer in layers.iter().filter(|l| l.collides_internally()) {
        layer
            .free()
            .for_each_internal_colission(&mut |a, b| candidates.free.push(CandidatePair::new(a, b)));
        layer
            .free()
            .for_each_colission_with(layer.terrain(), &mut |a, b| {
                candidates.free_terrain.push(CandidatePair::new(a, b))
            });
    }

    for (i, j) in mask.pairs() {
        let (Some(first), Some(second)) = (layers.get(i), layers.get(j)) else {
            continue;
        };
        first
            .free()
            .for_each_colission_with(second.free(), &mut |a, b| candidates.free.push(CandidatePair::new(a, b)));
        first
            .free()
            .for_each_colission_with(second.terrain(), &mut |a, b| {
                candidates.free_terrain.push(CandidatePair::new(a, b))
            });
        second
            .free()
            .for_each_colission_with(first.terrain(), &mut |a, b| {
                candidates.free_terrain.push(CandidatePair::new(a, b))
            });
    }

    candidates
}

fn refine_one(ctx: &DetectionContext<'_>, pair: &CandidatePair) -> Result<Option<Colission>> {
    let a = ctx.parts.get_checked(pair.part_a, "Colliding part")?;
    let b = ctx.parts.get_checked(pair.part_b, "Colliding part")?;
    let contact = safe_intersects(ctx.test, (pair.part_a, a), (pair.part_b, b), &ctx.dumps)?;
    Ok(contact.map(|c| Colission {
        part_a: pair.part_a,
        part_b: pair.part_b,
        contact_point: c.contact_point,
        exit_vector: c.exit_vector,
    }))
}

/// Runs the exact intersection test on every candidate, keeping the ones that intersect
pub fn refine_colissions(ctx: &DetectionContext<'_>, candidates: &[CandidatePair]) -> Result<Vec<Colission>> {
    let mut confirmed = Vec::new();
    for pair in candidates {
        if let Some(colission) = refine_one(ctx, pair)? {
            trace!("Confirmed colission {:?} - {:?}", pair.part_a, pair.part_b);
            confirmed.push(colission);
        }
    }
    Ok(confirmed)
}

/// Parallel version of [`refine_colissions`].
///
/// Workers claim candidates through a shared index. The output is sorted back
/// into candidate order so a rerun on the same candidates gives the same result.
pub fn parallel_refine_colissions(
    pool: &ThreadPool,
    ctx: &DetectionContext<'_>,
    candidates: &[CandidatePair],
) -> Result<Vec<Colission>> {
    let next = AtomicUsize::new(0);
    let confirmed: Mutex<Vec<(usize, Colission)>> = Mutex::new(Vec::new());
    let failure: Mutex<Option<PhysicsError>> = Mutex::new(None);

    pool.run_on_all(&|| loop {
        let index = next.fetch_add(1, Ordering::Relaxed);
        if index >= candidates.len() || failure.lock().is_some() {
            break;
        }
        match refine_one(ctx, &candidates[index]) {
            Ok(Some(colission)) => confirmed.lock().push((index, colission)),
            Ok(None) => {}
            Err(err) => {
                failure.lock().get_or_insert(err);
                break;
            }
        }
    });

    if let Some(err) = failure.into_inner() {
        return Err(err);
    }
    let mut confirmed = confirmed.into_inner();
    confirmed.sort_by_key(|(index, _)| *index);
    Ok(confirmed.into_iter().map(|(_, c)| c).collect())
}

/// Broad and narrow phase on the calling thread
pub fn find_colissions(ctx: &DetectionContext<'_>) -> Result<ColissionBuffer> {
    let start = Instant::now();
    let candidates = gather_candidates(ctx.layers, ctx.mask);
    let buffer = ColissionBuffer {
        free_colissions: refine_colissions(ctx, &candidates.free)?,
        free_terrain_colissions: refine_colissions(ctx, &candidates.free_terrain)?,
        candidate_count: candidates.len(),
        detection_time: start.elapsed(),
    };
    debug!(
        "Detected {} colissions out of {} candidates",
        buffer.len(),
        buffer.candidate_count
    );
    Ok(buffer)
}

/// Broad phase on the calling thread, narrow phase spread over the pool
pub fn find_colissions_parallel(pool: &ThreadPool, ctx: &DetectionContext<'_>) -> Result<ColissionBuffer> {
    let start = Instant::now();
    let candidates = gather_candidates(ctx.layers, ctx.mask);
    let buffer = ColissionBuffer {
        free_colissions: parallel_refine_colissions(pool, ctx, &candidates.free)?,
        free_terrain_colissions: parallel_refine_colissions(pool, ctx, &candidates.free_terrain)?,
        candidate_count: candidates.len(),
        detection_time: start.elapsed(),
    };
    debug!(
        "Detected {} colissions out of {} candidates on {} threads",
        buffer.len(),
        buffer.candidate_count,
        pool.worker_count() + 1
    );
    Ok(buffer)
}
