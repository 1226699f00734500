use std::collections::HashSet;

use mlmd_store::{MetadataStore, PropertyType, PutTypeOptions, Type, TypeKind};
use rand::rngs::SmallRng;
use rand_distr::Uniform;

use crate::config::FillTypesConfig;
use crate::util::{existing_types, sample_count, total_types, type_bytes};
use crate::workload::{Generator, WorkItem};
use crate::{Error, Result};

/// A type to write with [`MetadataStore::put_type`].
#[derive(Clone, Debug)]
pub struct PutTypeRequest {
    /// The kind of the type.
    pub kind: TypeKind,
    /// The full type, including properties it already had when updating.
    pub ty: Type,
    /// Set when the request adds properties to an existing type.
    pub options: PutTypeOptions,
}

/// Creates new types, or adds properties to existing ones.
///
/// Inserted types are named `type_<k>` and declare between `num_properties.minimum` and
/// `num_properties.maximum` string properties. Updates add at least one new `add_p-<j>` property
/// to each of the first existing types.
#[derive(Debug)]
pub struct FillTypes {
    config: FillTypesConfig,
    num_properties: Uniform<u64>,
}

impl FillTypes {
    /// Creates the generator, validating the configured ranges.
    pub fn new(config: &FillTypesConfig) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            num_properties: config.num_properties.sampler()?,
        })
    }

    fn kind(&self) -> TypeKind {
        self.config.specification.kind()
    }

    fn generate_inserts(
        &self,
        store: &dyn MetadataStore,
        num_operations: usize,
        rng: &mut SmallRng,
    ) -> Result<Vec<WorkItem<PutTypeRequest>>> {
        let mut taken: HashSet<String> = existing_types(self.kind(), store)?
            .into_iter()
            .map(|ty| ty.name)
            .collect();
        let mut next = total_types(store)?;

        let mut work_items = Vec::with_capacity(num_operations);
        for _ in 0..num_operations {
            let name = loop {
                let name = format!("type_{next}");
                next += 1;
                if taken.insert(name.clone()) {
                    break name;
                }
            };

            let mut ty = Type::new(name);
            for i in 0..sample_count(&self.num_properties, rng) {
                ty.properties.insert(format!("p-{i}"), PropertyType::String);
            }

            let bytes = type_bytes(&ty);
            let request = PutTypeRequest {
                kind: self.kind(),
                ty,
                options: PutTypeOptions::default(),
            };
            work_items.push(WorkItem::new(request, bytes));
        }

        Ok(work_items)
    }

    fn generate_updates(
        &self,
        store: &dyn MetadataStore,
        num_operations: usize,
        rng: &mut SmallRng,
    ) -> Result<Vec<WorkItem<PutTypeRequest>>> {
        let mut existing = existing_types(self.kind(), store)?;
        if existing.len() < num_operations {
            self.make_up(store, num_operations - existing.len(), rng)?;
            existing = existing_types(self.kind(), store)?;
        }
        if existing.len() < num_operations {
            return Err(Error::FailedPrecondition(format!(
                "{} {}s exist, {num_operations} needed for updates",
                existing.len(),
                self.kind()
            )));
        }

        let mut work_items = Vec::with_capacity(num_operations);
        for mut ty in existing.into_iter().take(num_operations) {
            let added = sample_count(&self.num_properties, rng).max(1);
            let mut next = ty.properties.len();
            for _ in 0..added {
                let name = loop {
                    let name = format!("add_p-{next}");
                    next += 1;
                    if !ty.properties.contains_key(&name) {
                        break name;
                    }
                };
                ty.properties.insert(name, PropertyType::String);
            }

            let bytes = type_bytes(&ty);
            let request = PutTypeRequest {
                kind: self.kind(),
                ty,
                options: PutTypeOptions {
                    can_add_fields: true,
                },
            };
            work_items.push(WorkItem::new(request, bytes));
        }

        Ok(work_items)
    }

    /// Inserts `missing` new types so that there are enough types to update.
    fn make_up(&self, store: &dyn MetadataStore, missing: usize, rng: &mut SmallRng) -> Result<()> {
        tracing::info!(kind = %self.kind(), missing, "inserting types to update");

        let work_items = self.generate_inserts(store, missing, rng)?;
        for item in &work_items {
            if let Err(error) = self.execute(&item.request, store) {
                tracing::warn!(
                    error = &error as &dyn std::error::Error,
                    name = %item.request.ty.name,
                    "failed to insert type"
                );
            }
        }
        Ok(())
    }
}

impl Generator for FillTypes {
    type Request = PutTypeRequest;

    fn name(&self) -> String {
        let mut name = format!("fill_{}", self.kind());
        if self.config.update {
            name.push_str("(update)");
        }
        name
    }

    fn generate(
        &self,
        store: &dyn MetadataStore,
        num_operations: usize,
        rng: &mut SmallRng,
    ) -> Result<Vec<WorkItem<PutTypeRequest>>> {
        if self.config.update {
            self.generate_updates(store, num_operations, rng)
        } else {
            self.generate_inserts(store, num_operations, rng)
        }
    }

    fn execute(&self, request: &PutTypeRequest, store: &dyn MetadataStore) -> Result<()> {
        store.put_type(request.kind, &request.ty, request.options)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use mlmd_store::{ConnectionConfig, connect};

    use super::*;
    use crate::config::{FillTypesSpecification, UniformDistribution};
    use crate::util::insert_types_in_db;
    use crate::workload::{GeneratedWorkload, Workload};

    fn config(specification: FillTypesSpecification, update: bool) -> FillTypesConfig {
        FillTypesConfig {
            specification,
            update,
            num_properties: UniformDistribution::new(1, 10),
        }
    }

    fn run(workload: &mut dyn Workload, store: &dyn MetadataStore) {
        workload.prepare(store).unwrap();
        for index in 0..workload.num_operations() {
            workload.execute(index, store).unwrap();
        }
        workload.teardown();
    }

    #[test]
    fn names() {
        let fill = |specification, update| FillTypes::new(&config(specification, update)).unwrap().name();
        assert_eq!(fill(FillTypesSpecification::ArtifactType, false), "fill_artifact_type");
        assert_eq!(
            fill(FillTypesSpecification::ExecutionType, true),
            "fill_execution_type(update)"
        );
        assert_eq!(fill(FillTypesSpecification::ContextType, false), "fill_context_type");
    }

    #[test]
    fn insert_artifact_types() {
        let store = connect(&ConnectionConfig::FakeDatabase).unwrap();
        let generator = FillTypes::new(&config(FillTypesSpecification::ArtifactType, false)).unwrap();
        let mut workload = GeneratedWorkload::new(generator, 100, 1);

        workload.prepare(store.as_ref()).unwrap();
        for item in workload.work_items() {
            assert_eq!(item.transferred_bytes, type_bytes(&item.request.ty));
        }
        run(&mut workload, store.as_ref());

        let types = store.get_types(TypeKind::Artifact).unwrap();
        assert_eq!(types.len(), 100);
        let names: HashSet<_> = types.iter().map(|ty| ty.name.as_str()).collect();
        assert_eq!(names.len(), 100);
        for ty in &types {
            assert!((1..=10).contains(&ty.properties.len()), "{ty:?}");
        }
    }

    #[test]
    fn insert_skips_taken_names() {
        let store = connect(&ConnectionConfig::FakeDatabase).unwrap();
        insert_types_in_db(0, 3, 0, store.as_ref()).unwrap();
        store
            .put_type(TypeKind::Context, &Type::new("type_4"), Default::default())
            .unwrap();

        let generator = FillTypes::new(&config(FillTypesSpecification::ContextType, false)).unwrap();
        let mut workload = GeneratedWorkload::new(generator, 5, 2);
        run(&mut workload, store.as_ref());

        assert_eq!(store.get_types(TypeKind::Context).unwrap().len(), 6);
    }

    #[test]
    fn update_makes_up_missing_types() {
        let store = connect(&ConnectionConfig::FakeDatabase).unwrap();
        insert_types_in_db(20, 0, 0, store.as_ref()).unwrap();
        let before: HashMap<_, _> = store
            .get_types(TypeKind::Artifact)
            .unwrap()
            .into_iter()
            .map(|ty| (ty.name.clone(), ty))
            .collect();

        let generator = FillTypes::new(&config(FillTypesSpecification::ArtifactType, true)).unwrap();
        let mut workload = GeneratedWorkload::new(generator, 50, 3);
        workload.prepare(store.as_ref()).unwrap();
        assert_eq!(store.get_types(TypeKind::Artifact).unwrap().len(), 50);
        for index in 0..50 {
            workload.execute(index, store.as_ref()).unwrap();
        }

        let after = store.get_types(TypeKind::Artifact).unwrap();
        assert_eq!(after.len(), 50);
        for ty in &after {
            if let Some(old) = before.get(&ty.name) {
                assert_eq!(ty.id, old.id);
                assert!(ty.properties.len() > old.properties.len());
            }
        }
    }

    #[test]
    fn update_increases_properties() {
        let store = connect(&ConnectionConfig::FakeDatabase).unwrap();
        insert_types_in_db(0, 0, 10, store.as_ref()).unwrap();
        let before = store.get_types(TypeKind::Context).unwrap();

        let generator = FillTypes::new(&config(FillTypesSpecification::ContextType, true)).unwrap();
        let mut workload = GeneratedWorkload::new(generator, 10, 4);
        run(&mut workload, store.as_ref());

        let after = store.get_types(TypeKind::Context).unwrap();
        for (old, new) in before.iter().zip(&after) {
            assert_eq!(old.id, new.id);
            assert!(new.properties.len() > old.properties.len());
        }
    }

    #[test]
    fn same_seed_same_requests() {
        let store = connect(&ConnectionConfig::FakeDatabase).unwrap();
        let make = || {
            let generator =
                FillTypes::new(&config(FillTypesSpecification::ExecutionType, false)).unwrap();
            let mut workload = GeneratedWorkload::new(generator, 20, 99);
            workload.prepare(store.as_ref()).unwrap();
            workload
                .work_items()
                .iter()
                .map(|item| item.request.ty.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(make(), make());
    }
}
