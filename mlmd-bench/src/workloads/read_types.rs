use mlmd_store::{Id, MetadataStore, TypeKind};
use rand::Rng;
use rand::rngs::SmallRng;

use crate::config::{ReadTypesConfig, ReadTypesSpecification};
use crate::util::{existing_types, read_type_bytes};
use crate::workload::{Generator, WorkItem};
use crate::{Error, Result};

/// A read of types.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReadTypesRequest {
    /// All types of a kind.
    All(TypeKind),
    /// The type of a kind with the given id.
    ById(TypeKind, Id),
    /// The type of a kind with the given name.
    ByName(TypeKind, String),
}

/// Reads all types of a kind, or a random type by id or by name.
#[derive(Debug)]
pub struct ReadTypes {
    config: ReadTypesConfig,
}

impl ReadTypes {
    /// Creates the generator.
    pub fn new(config: &ReadTypesConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn kind(&self) -> TypeKind {
        use ReadTypesSpecification::*;
        match self.config.specification {
            AllArtifactTypes | ArtifactTypesById | ArtifactTypeByName => TypeKind::Artifact,
            AllExecutionTypes | ExecutionTypesById | ExecutionTypeByName => TypeKind::Execution,
            AllContextTypes | ContextTypesById | ContextTypeByName => TypeKind::Context,
        }
    }
}

impl Generator for ReadTypes {
    type Request = ReadTypesRequest;

    fn name(&self) -> String {
        use ReadTypesSpecification::*;
        let kind = self.kind().node_kind();
        match self.config.specification {
            AllArtifactTypes | AllExecutionTypes | AllContextTypes => {
                format!("read_all_{kind}_types")
            }
            ArtifactTypesById | ExecutionTypesById | ContextTypesById => {
                format!("read_{kind}_types_by_id")
            }
            ArtifactTypeByName | ExecutionTypeByName | ContextTypeByName => {
                format!("read_{kind}_type_by_name")
            }
        }
    }

    fn generate(
        &self,
        store: &dyn MetadataStore,
        num_operations: usize,
        rng: &mut SmallRng,
    ) -> Result<Vec<WorkItem<ReadTypesRequest>>> {
        use ReadTypesSpecification::*;

        let kind = self.kind();
        let types = existing_types(kind, store)?;
        if types.is_empty() {
            return Err(Error::FailedPrecondition(format!("no {kind}s to read")));
        }

        let all_bytes: u64 = types.iter().map(read_type_bytes).sum();
        let mut work_items = Vec::with_capacity(num_operations);
        for _ in 0..num_operations {
            let ty = &types[rng.random_range(0..types.len())];
            let item = match self.config.specification {
                AllArtifactTypes | AllExecutionTypes | AllContextTypes => {
                    WorkItem::new(ReadTypesRequest::All(kind), all_bytes)
                }
                ArtifactTypesById | ExecutionTypesById | ContextTypesById => {
                    let id = ty.id.ok_or_else(|| {
                        Error::InvalidArgument(format!("{kind} `{}` has no id", ty.name))
                    })?;
                    WorkItem::new(ReadTypesRequest::ById(kind, id), read_type_bytes(ty))
                }
                ArtifactTypeByName | ExecutionTypeByName | ContextTypeByName => WorkItem::new(
                    ReadTypesRequest::ByName(kind, ty.name.clone()),
                    read_type_bytes(ty),
                ),
            };
            work_items.push(item);
        }

        Ok(work_items)
    }

    fn execute(&self, request: &ReadTypesRequest, store: &dyn MetadataStore) -> Result<()> {
        match request {
            ReadTypesRequest::All(kind) => {
                store.get_types(*kind)?;
            }
            ReadTypesRequest::ById(kind, id) => {
                store.get_types_by_id(*kind, &[*id])?;
            }
            ReadTypesRequest::ByName(kind, name) => {
                store.get_type(*kind, name)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mlmd_store::{ConnectionConfig, connect};

    use super::*;
    use crate::util::insert_types_in_db;
    use crate::workload::{GeneratedWorkload, Workload};

    fn workload(specification: ReadTypesSpecification, n: usize) -> GeneratedWorkload<ReadTypes> {
        GeneratedWorkload::new(ReadTypes::new(&ReadTypesConfig { specification }), n, 31)
    }

    #[test]
    fn names() {
        assert_eq!(
            workload(ReadTypesSpecification::AllArtifactTypes, 1).name(),
            "read_all_artifact_types"
        );
        assert_eq!(
            workload(ReadTypesSpecification::ExecutionTypesById, 1).name(),
            "read_execution_types_by_id"
        );
        assert_eq!(
            workload(ReadTypesSpecification::ContextTypeByName, 1).name(),
            "read_context_type_by_name"
        );
    }

    #[test]
    fn requires_types() {
        let store = connect(&ConnectionConfig::FakeDatabase).unwrap();
        let mut workload = workload(ReadTypesSpecification::ArtifactTypeByName, 1);
        assert!(matches!(
            workload.prepare(store.as_ref()),
            Err(Error::FailedPrecondition(_))
        ));
    }

    #[test]
    fn zero_operations_need_no_types() {
        let store = connect(&ConnectionConfig::FakeDatabase).unwrap();
        let mut workload = workload(ReadTypesSpecification::AllArtifactTypes, 0);
        workload.prepare(store.as_ref()).unwrap();
        assert!(workload.work_items().is_empty());
    }

    #[test]
    fn reads_every_shape() {
        let store = connect(&ConnectionConfig::FakeDatabase).unwrap();
        insert_types_in_db(4, 5, 6, store.as_ref()).unwrap();

        for specification in [
            ReadTypesSpecification::AllArtifactTypes,
            ReadTypesSpecification::AllExecutionTypes,
            ReadTypesSpecification::AllContextTypes,
            ReadTypesSpecification::ArtifactTypesById,
            ReadTypesSpecification::ExecutionTypesById,
            ReadTypesSpecification::ContextTypesById,
            ReadTypesSpecification::ArtifactTypeByName,
            ReadTypesSpecification::ExecutionTypeByName,
            ReadTypesSpecification::ContextTypeByName,
        ] {
            let mut workload = workload(specification, 10);
            workload.prepare(store.as_ref()).unwrap();
            for index in 0..10 {
                let op = workload.execute(index, store.as_ref()).unwrap();
                assert!(op.transferred_bytes > 0);
            }
        }
    }

    #[test]
    fn read_all_counts_every_type() {
        let store = connect(&ConnectionConfig::FakeDatabase).unwrap();
        insert_types_in_db(3, 0, 0, store.as_ref()).unwrap();
        let expected: u64 = store
            .get_types(TypeKind::Artifact)
            .unwrap()
            .iter()
            .map(read_type_bytes)
            .sum();

        let mut workload = workload(ReadTypesSpecification::AllArtifactTypes, 2);
        workload.prepare(store.as_ref()).unwrap();
        assert!(
            workload
                .work_items()
                .iter()
                .all(|item| item.transferred_bytes == expected)
        );
    }
}
