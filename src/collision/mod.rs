mod bounds_tree;
mod colission;
mod intersection;
mod layer;
mod pipeline;
mod response;

pub use self::bounds_tree::{BoundsTree, BruteForceTree};
pub use self::colission::{CandidatePair, Candidates, Colission, ColissionBuffer};
pub use self::intersection::{safe_intersects, BoundingSphereIntersection, Contact, DumpTarget, IntersectionTest};
pub use self::layer::{ColissionLayer, ColissionMask, LayerId, SubLayer, WorldLayer};
pub use self::pipeline::{
    find_colissions, find_colissions_parallel, gather_candidates, parallel_refine_colissions, refine_colissions,
    DetectionContext,
};
pub use self::response::{handle_colission, ResponseOutcome, ResponseParams};
