//! Pairwise orchestration.
//!
//! Rules are visited in execution order and each rule is paired with every rule
//! after it, so every unordered pair is looked at once with `a` running first.
//!
//! Shadowing has to be decided in strict order: a rule found to be shadowed is
//! skipped whenever it would be the outer rule of a later row. It is still paired
//! as the inner rule by every row that is not skipped. All SHD results are
//! therefore computed first, sequentially. The remaining detectors have no
//! cross-pair dependency and run in parallel over the visited rows.

use crate::detectors::{default_detectors, detect_shadowing, BlockingIndex, DetectionContext, PairDetector};
use crate::error::{Result, RulemeshError};
use crate::types::{Relationship, RelationshipType};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cooperative cancellation flag shared between the caller and the workers.
///
/// A cancelled run returns `RulemeshError::Cancelled` and no relationships.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Result of the sequential shadowing pass
#[derive(Debug, Default)]
struct ShadowPass {
    /// Execution positions of the rows that are visited
    rows: Vec<usize>,
    /// SHD relationships keyed by (outer, inner) execution position
    shadows: FxHashMap<(usize, usize), Relationship>,
    shadowed: FxHashSet<usize>,
}

pub struct RelationshipAnalyzer<'a> {
    ctx: DetectionContext<'a>,
    blocking: BlockingIndex,
    detectors: Vec<Box<dyn PairDetector>>,
}

impl<'a> RelationshipAnalyzer<'a> {
    pub fn new(ctx: DetectionContext<'a>) -> Self {
        Self::with_detectors(ctx, default_detectors(ctx.config))
    }

    /// Use `detectors` for the parallel phase instead of the built-in RXD/COR/SUB set.
    pub fn with_detectors(ctx: DetectionContext<'a>, mut detectors: Vec<Box<dyn PairDetector>>) -> Self {
        // per-pair output follows type order
        detectors.sort_by_key(|d| d.kind());
        Self {
            blocking: BlockingIndex::build(ctx.rules, ctx.matrix),
            ctx,
            detectors,
        }
    }

    /// Run the requested detectors over all visited pairs.
    ///
    /// Relationships come back in pair order (outer rule, then inner rule, both in
    /// execution order) and, within a pair, in SHD, RXD, COR, SUB order.
    pub fn analyze(&self, types: &[RelationshipType], cancel: &CancellationToken) -> Result<Vec<Relationship>> {
        let start = std::time::Instant::now();
        info!(
            "Analyzing {} rules against {} transactions ({})",
            self.ctx.rules.len(),
            self.ctx.corpus.len(),
            types.iter().map(RelationshipType::code).collect::<Vec<_>>().join(",")
        );

        let pass = self.shadow_pass(types.contains(&RelationshipType::Shadowing), cancel)?;
        debug!(
            "Shadow pass: {} shadowed rules, {} of {} rows visited",
            pass.shadowed.len(),
            pass.rows.len(),
            self.ctx.rules.len()
        );

        let active: Vec<&dyn PairDetector> = self
            .detectors
            .iter()
            .filter(|d| types.contains(&d.kind()))
            .map(|d| d.as_ref())
            .collect();

        let per_row: Vec<Vec<Relationship>> = pass
            .rows
            .par_iter()
            .map(|&i| self.evaluate_row(i, &active, &pass.shadows, cancel))
            .collect::<Result<_>>()?;

        if cancel.is_cancelled() {
            return Err(RulemeshError::Cancelled);
        }

        let relationships: Vec<Relationship> = per_row.into_iter().flatten().collect();
        info!("Found {} relationships in {:?}", relationships.len(), start.elapsed());
        Ok(relationships)
    }

    fn shadow_pass(&self, detect: bool, cancel: &CancellationToken) -> Result<ShadowPass> {
        let order = self.ctx.rules.execution_order();
        let mut pass = ShadowPass::default();

        for (i, &a) in order.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(RulemeshError::Cancelled);
            }
            if pass.shadowed.contains(&a) {
                debug!("Rule {} is shadowed, not pairing it with later rules", self.ctx.rule_id(a));
                continue;
            }
            pass.rows.push(i);
            if !detect {
                continue;
            }

            for (j, &b) in order.iter().enumerate().skip(i + 1) {
                let result = detect_shadowing(&self.ctx, &self.blocking, a, b);
                if let Some(rel) = self.keep(RelationshipType::Shadowing, a, b, result)?.flatten() {
                    pass.shadowed.insert(b);
                    pass.shadows.insert((i, j), rel);
                }
            }
        }

        Ok(pass)
    }

    fn evaluate_row(
        &self,
        i: usize,
        detectors: &[&dyn PairDetector],
        shadows: &FxHashMap<(usize, usize), Relationship>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Relationship>> {
        let order = self.ctx.rules.execution_order();
        let a = order[i];
        let mut found = Vec::new();

        for (j, &b) in order.iter().enumerate().skip(i + 1) {
            if cancel.is_cancelled() {
                return Ok(Vec::new());
            }
            if let Some(rel) = shadows.get(&(i, j)) {
                found.push(rel.clone());
            }
            for detector in detectors {
                let result = detector.detect(&self.ctx, a, b);
                if let Some(rels) = self.keep(detector.kind(), a, b, result)? {
                    found.extend(rels);
                }
            }
        }

        Ok(found)
    }

    /// A recoverable failure only drops that (pair, type); anything else ends the run
    fn keep<T>(&self, kind: RelationshipType, a: usize, b: usize, result: Result<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_recoverable() => {
                warn!(
                    "Skipping {} for rules {} / {}: {}",
                    kind,
                    self.ctx.rule_id(a),
                    self.ctx.rule_id(b),
                    err
                );
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}
