//! Construction of workloads from their configuration.

use crate::config::{WorkloadConfig, WorkloadKind};
use crate::workload::{GeneratedWorkload, Workload};
use crate::workloads::{
    FillContextEdges, FillEvents, FillNodes, FillTypes, ReadEvents, ReadNodesByProperties,
    ReadNodesViaContextEdges, ReadTypes,
};
use crate::Result;

/// The ordered workloads of a run, each with the number of operations to execute.
#[derive(Debug)]
pub struct Benchmark {
    workloads: Vec<(Box<dyn Workload>, usize)>,
}

impl Benchmark {
    /// Creates one workload per configuration entry, preserving their order.
    ///
    /// Fails with [`Error::InvalidConfig`](crate::Error::InvalidConfig) if a configured range is
    /// empty.
    pub fn new(configs: &[WorkloadConfig]) -> Result<Self> {
        let workloads = configs
            .iter()
            .map(|config| Ok((create_workload(config)?, config.num_operations)))
            .collect::<Result<_>>()?;
        Ok(Self { workloads })
    }

    /// Creates a benchmark from already constructed workloads.
    pub fn from_workloads(workloads: Vec<Box<dyn Workload>>) -> Self {
        let workloads = workloads
            .into_iter()
            .map(|workload| {
                let num_operations = workload.num_operations();
                (workload, num_operations)
            })
            .collect();
        Self { workloads }
    }

    /// The workloads and their operation counts, in configuration order.
    pub fn workloads(&self) -> &[(Box<dyn Workload>, usize)] {
        &self.workloads
    }

    /// Mutable access to the workloads, for preparing and tearing them down.
    pub fn workloads_mut(&mut self) -> &mut [(Box<dyn Workload>, usize)] {
        &mut self.workloads
    }

    /// Number of workloads.
    pub fn len(&self) -> usize {
        self.workloads.len()
    }

    /// Returns `true` if no workloads are configured.
    pub fn is_empty(&self) -> bool {
        self.workloads.is_empty()
    }
}

fn create_workload(config: &WorkloadConfig) -> Result<Box<dyn Workload>> {
    let num_operations = config.num_operations;
    let seed = config.seed.unwrap_or_else(rand::random);

    let workload: Box<dyn Workload> = match &config.kind {
        WorkloadKind::FillTypesConfig(c) => {
            Box::new(GeneratedWorkload::new(FillTypes::new(c)?, num_operations, seed))
        }
        WorkloadKind::FillNodesConfig(c) => {
            Box::new(GeneratedWorkload::new(FillNodes::new(c)?, num_operations, seed))
        }
        WorkloadKind::FillContextEdgesConfig(c) => Box::new(GeneratedWorkload::new(
            FillContextEdges::new(c),
            num_operations,
            seed,
        )),
        WorkloadKind::FillEventsConfig(c) => {
            Box::new(GeneratedWorkload::new(FillEvents::new(c), num_operations, seed))
        }
        WorkloadKind::ReadTypesConfig(c) => {
            Box::new(GeneratedWorkload::new(ReadTypes::new(c), num_operations, seed))
        }
        WorkloadKind::ReadNodesByPropertiesConfig(c) => Box::new(GeneratedWorkload::new(
            ReadNodesByProperties::new(c),
            num_operations,
            seed,
        )),
        WorkloadKind::ReadNodesViaContextEdgesConfig(c) => Box::new(GeneratedWorkload::new(
            ReadNodesViaContextEdges::new(c),
            num_operations,
            seed,
        )),
        WorkloadKind::ReadEventsConfig(c) => {
            Box::new(GeneratedWorkload::new(ReadEvents::new(c), num_operations, seed))
        }
    };

    tracing::debug!(workload = workload.name(), num_operations, seed, "created workload");
    Ok(workload)
}
