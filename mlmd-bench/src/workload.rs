//! The contract every unit of load implements.
//!
//! A [`Workload`] goes through a fixed lifecycle: [`prepare`](Workload::prepare) synthesizes all
//! requests up front, [`execute`](Workload::execute) issues one of them by index and may be called
//! concurrently from many threads, and [`teardown`](Workload::teardown) releases the requests.
//!
//! Concrete workloads only decide which requests to synthesize and which store call to issue. They
//! implement [`Generator`] and are wrapped in a [`GeneratedWorkload`], which owns the work items,
//! the random source and the timing.

use std::fmt;
use std::time::Instant;

use mlmd_store::MetadataStore;
use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::stats::OpStats;
use crate::{Error, Result};

/// One configured, runnable unit of load.
pub trait Workload: fmt::Debug + Send + Sync {
    /// Stable name of the workload, used as the key of its report.
    fn name(&self) -> &str;

    /// Number of work items [`prepare`](Self::prepare) synthesizes.
    fn num_operations(&self) -> usize;

    /// Synthesizes all work items from the current state of `store`.
    ///
    /// Update workloads first insert enough new entities if the store holds fewer than they need.
    /// A workload without operations is prepared without looking at the store. Calling this again
    /// replaces the prepared work items.
    fn prepare(&mut self, store: &dyn MetadataStore) -> Result<()>;

    /// Issues the work item at `index` against `store`.
    ///
    /// Safe to call concurrently for any indices once the workload is prepared.
    fn execute(&self, index: usize, store: &dyn MetadataStore) -> Result<OpStats>;

    /// Releases all work items. [`execute`](Self::execute) fails until the workload is prepared
    /// again.
    fn teardown(&mut self);

    /// Number of work items currently held.
    fn num_work_items(&self) -> usize;
}

/// A synthesized request and the number of bytes it is estimated to transfer.
#[derive(Clone, Debug)]
pub struct WorkItem<R> {
    /// The request issued by [`Workload::execute`].
    pub request: R,
    /// Estimated size of the data written or read.
    pub transferred_bytes: u64,
}

impl<R> WorkItem<R> {
    /// Creates a work item.
    pub fn new(request: R, transferred_bytes: u64) -> Self {
        Self {
            request,
            transferred_bytes,
        }
    }
}

/// Synthesizes requests of one workload kind and issues them.
pub trait Generator: fmt::Debug + Send + Sync {
    /// The request type issued to the store.
    type Request: fmt::Debug + Send + Sync;

    /// The stable name of the workload.
    fn name(&self) -> String;

    /// Synthesizes `num_operations` work items from the current state of `store`.
    fn generate(
        &self,
        store: &dyn MetadataStore,
        num_operations: usize,
        rng: &mut SmallRng,
    ) -> Result<Vec<WorkItem<Self::Request>>>;

    /// Issues one request.
    fn execute(&self, request: &Self::Request, store: &dyn MetadataStore) -> Result<()>;
}

/// A [`Workload`] issuing the requests of a [`Generator`].
pub struct GeneratedWorkload<G: Generator> {
    name: String,
    generator: G,
    num_operations: usize,
    rng: SmallRng,
    work_items: Vec<WorkItem<G::Request>>,
    is_prepared: bool,
}

impl<G: Generator> GeneratedWorkload<G> {
    /// Creates a workload of `num_operations` operations with a random source seeded by `seed`.
    pub fn new(generator: G, num_operations: usize, seed: u64) -> Self {
        Self {
            name: generator.name(),
            generator,
            num_operations,
            rng: SmallRng::seed_from_u64(seed),
            work_items: Vec::new(),
            is_prepared: false,
        }
    }

    /// The prepared work items.
    pub fn work_items(&self) -> &[WorkItem<G::Request>] {
        &self.work_items
    }
}

impl<G: Generator> Workload for GeneratedWorkload<G> {
    fn name(&self) -> &str {
        &self.name
    }

    fn num_operations(&self) -> usize {
        self.num_operations
    }

    fn prepare(&mut self, store: &dyn MetadataStore) -> Result<()> {
        tracing::debug!(workload = %self.name, num_operations = self.num_operations, "preparing");

        if self.num_operations == 0 {
            self.work_items = Vec::new();
            self.is_prepared = true;
            return Ok(());
        }

        let work_items = self
            .generator
            .generate(store, self.num_operations, &mut self.rng)?;
        if work_items.len() != self.num_operations {
            return Err(Error::FailedPrecondition(format!(
                "`{}` prepared {} of {} work items",
                self.name,
                work_items.len(),
                self.num_operations
            )));
        }

        self.work_items = work_items;
        self.is_prepared = true;
        Ok(())
    }

    fn execute(&self, index: usize, store: &dyn MetadataStore) -> Result<OpStats> {
        if !self.is_prepared {
            return Err(Error::NotSetUp(self.name.clone()));
        }
        let item = self.work_items.get(index).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "index {index} out of range for `{}` with {} work items",
                self.name,
                self.work_items.len()
            ))
        })?;

        let start = Instant::now();
        self.generator.execute(&item.request, store)?;

        Ok(OpStats {
            elapsed: start.elapsed(),
            transferred_bytes: item.transferred_bytes,
        })
    }

    fn teardown(&mut self) {
        self.work_items = Vec::new();
        self.is_prepared = false;
    }

    fn num_work_items(&self) -> usize {
        self.work_items.len()
    }
}

impl<G: Generator> fmt::Debug for GeneratedWorkload<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedWorkload")
            .field("name", &self.name)
            .field("generator", &self.generator)
            .field("num_operations", &self.num_operations)
            .field("work_items", &self.work_items.len())
            .field("is_prepared", &self.is_prepared)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use mlmd_store::{ConnectionConfig, connect};

    use super::*;

    #[derive(Debug)]
    struct Numbers;

    impl Generator for Numbers {
        type Request = usize;

        fn name(&self) -> String {
            "numbers".into()
        }

        fn generate(
            &self,
            _store: &dyn MetadataStore,
            num_operations: usize,
            _rng: &mut SmallRng,
        ) -> Result<Vec<WorkItem<usize>>> {
            Ok((0..num_operations).map(|i| WorkItem::new(i, i as u64)).collect())
        }

        fn execute(&self, _request: &usize, _store: &dyn MetadataStore) -> Result<()> {
            Ok(())
        }
    }

    /// Needs at least one type in the store for every work item.
    #[derive(Debug)]
    struct NeedsTypes;

    impl Generator for NeedsTypes {
        type Request = ();

        fn name(&self) -> String {
            "needs_types".into()
        }

        fn generate(
            &self,
            store: &dyn MetadataStore,
            num_operations: usize,
            _rng: &mut SmallRng,
        ) -> Result<Vec<WorkItem<()>>> {
            if store.get_types(mlmd_store::TypeKind::Artifact)?.is_empty() {
                return Err(Error::FailedPrecondition("no types".into()));
            }
            Ok((0..num_operations).map(|_| WorkItem::new((), 0)).collect())
        }

        fn execute(&self, _request: &(), _store: &dyn MetadataStore) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn zero_operations_on_empty_store() {
        let store = connect(&ConnectionConfig::FakeDatabase).unwrap();

        let mut empty = GeneratedWorkload::new(NeedsTypes, 0, 0);
        empty.prepare(store.as_ref()).unwrap();
        assert_eq!(empty.num_work_items(), 0);
        assert!(matches!(
            empty.execute(0, store.as_ref()),
            Err(Error::InvalidArgument(_))
        ));

        let mut one = GeneratedWorkload::new(NeedsTypes, 1, 0);
        assert!(matches!(
            one.prepare(store.as_ref()),
            Err(Error::FailedPrecondition(_))
        ));
    }

    #[test]
    fn lifecycle() {
        let store = connect(&ConnectionConfig::FakeDatabase).unwrap();
        let mut workload = GeneratedWorkload::new(Numbers, 3, 0);

        assert_eq!(workload.name(), "numbers");
        assert!(matches!(
            workload.execute(0, store.as_ref()),
            Err(Error::NotSetUp(_))
        ));

        workload.prepare(store.as_ref()).unwrap();
        assert_eq!(workload.num_work_items(), 3);
        assert_eq!(workload.execute(2, store.as_ref()).unwrap().transferred_bytes, 2);
        assert!(matches!(
            workload.execute(3, store.as_ref()),
            Err(Error::InvalidArgument(_))
        ));

        workload.teardown();
        assert_eq!(workload.num_work_items(), 0);
        assert!(matches!(
            workload.execute(0, store.as_ref()),
            Err(Error::NotSetUp(_))
        ));
    }
}
