#![cfg(feature = "memory-store")]

use async_trait::async_trait;
use fulcrum_security::{
    EntityId, EntityKind, EntityLookup, EntityRecord, EntityStore, Error, Group, MemoryStore,
    ModelKind, Permission, Relationship, RelationshipKind, RelationshipStore, RevokeOutcome, Role,
    SecurityEntity, SecurityService, SecurityServiceBuilder, StoreError, User, UserGroupRole,
};
use futures::executor::block_on;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn new_service(model: ModelKind) -> SecurityService<MemoryStore> {
    block_on(SecurityServiceBuilder::new(MemoryStore::new()).model(model).build()).unwrap()
}

fn add_user<S: fulcrum_security::Store>(service: &SecurityService<S>, name: &str) -> User {
    block_on(service.user_manager().add(User::new(service.model(), name))).unwrap()
}

fn add_group<S: fulcrum_security::Store>(service: &SecurityService<S>, name: &str) -> Group {
    block_on(service.group_manager().add(Group::new(service.model(), name))).unwrap()
}

fn add_role<S: fulcrum_security::Store>(service: &SecurityService<S>, name: &str) -> Role {
    block_on(service.role_manager().add(Role::new(service.model(), name))).unwrap()
}

fn add_permission<S: fulcrum_security::Store>(service: &SecurityService<S>, name: &str) -> Permission {
    block_on(service.permission_manager().add(Permission::new(service.model(), name))).unwrap()
}

#[test]
fn clint_joins_and_leaves_dev() {
    let service = new_service(ModelKind::Basic);
    let clint = block_on(
        service
            .user_manager()
            .add(block_on(service.user_manager().instance_named("Clint")).unwrap()),
    )
    .unwrap();
    let dev = block_on(
        service
            .group_manager()
            .add(block_on(service.group_manager().instance_named("Dev")).unwrap()),
    )
    .unwrap();
    let model = service.model_manager();

    block_on(model.grant_user_group(&clint, &dev)).unwrap();
    let groups = block_on(model.groups_of(&clint)).unwrap();
    assert_eq!(groups.len(), 1);
    assert!(groups.contains_name("dev"));

    assert_eq!(
        block_on(model.revoke_user_group(&clint, &dev)).unwrap(),
        RevokeOutcome::Revoked
    );
    assert_eq!(block_on(model.groups_of(&clint)).unwrap().len(), 0);
}

#[test]
fn removing_a_user_cascades_across_groups() {
    let service = new_service(ModelKind::Simple);
    let clint = add_user(&service, "clint");
    let amy = add_user(&service, "amy");
    let dev = add_group(&service, "dev");
    let ops = add_group(&service, "ops");
    let model = service.model_manager();
    block_on(model.grant_user_group(&clint, &dev)).unwrap();
    block_on(model.grant_user_group(&clint, &ops)).unwrap();
    block_on(model.grant_user_group(&amy, &dev)).unwrap();

    block_on(service.user_manager().remove(&clint)).unwrap();

    assert!(!block_on(service.user_manager().check_exists("clint")).unwrap());
    assert!(block_on(model.users_of(&ops)).unwrap().is_empty());
    let dev_members = block_on(model.users_of(&dev)).unwrap();
    assert_eq!(dev_members.names().collect::<Vec<_>>(), vec!["amy"]);
    assert_eq!(service.store().relationship_count(), 1);
    assert!(matches!(
        block_on(model.grant_user_group(&clint, &dev)),
        Err(Error::UnknownEntity { .. })
    ));
}

#[test]
fn removing_a_role_cascades_through_the_model_manager() {
    let service = new_service(ModelKind::Dynamic);
    let dev = add_group(&service, "dev");
    let admin = add_role(&service, "admin");
    let deploy = add_permission(&service, "deploy");
    let model = service.model_manager();
    block_on(model.grant_group_role(&dev, &admin)).unwrap();
    block_on(model.grant_role_permission(&admin, &deploy)).unwrap();

    block_on(model.remove_entity(&admin)).unwrap();

    assert!(block_on(model.roles_of(&dev)).unwrap().is_empty());
    assert!(block_on(model.roles_with_permission(&deploy)).unwrap().is_empty());
    assert_eq!(service.store().relationship_count(), 0);
    assert_eq!(service.store().entity_count(EntityKind::Role), 0);
}

#[test]
fn duplicate_triple_grant_is_idempotent() {
    let service = new_service(ModelKind::Turbine);
    let clint = add_user(&service, "clint");
    let dev = add_group(&service, "dev");
    let admin = add_role(&service, "admin");
    let model = service.model_manager();

    block_on(model.grant_user_group_role(&clint, &dev, &admin)).unwrap();
    let before = block_on(model.roles_in_group(&clint, &dev)).unwrap().len();
    block_on(model.grant_user_group_role(&clint, &dev, &admin)).unwrap();
    let after = block_on(model.roles_in_group(&clint, &dev)).unwrap().len();

    assert_eq!(before, 1);
    assert_eq!(before, after);
    assert_eq!(service.store().relationship_count(), 1);
    assert_eq!(
        block_on(model.user_group_roles(&clint)).unwrap(),
        vec![UserGroupRole::new(&clint, &dev, &admin).unwrap()]
    );

    assert!(block_on(model.revoke_user_group_role(&clint, &dev, &admin)).unwrap().is_revoked());
    assert_eq!(
        block_on(model.revoke_user_group_role(&clint, &dev, &admin)).unwrap(),
        RevokeOutcome::NotFound
    );
}

#[test]
fn global_group_is_stable_per_domain() {
    let service = new_service(ModelKind::Turbine);
    let model = service.model_manager();

    let first = block_on(model.global_group()).unwrap();
    let second = block_on(model.global_group()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.name(), "global");

    assert!(matches!(
        block_on(service.group_manager().remove(&first)),
        Err(Error::GlobalGroupProtected)
    ));
    assert!(matches!(
        block_on(service.group_manager().rename(&first, "everyone")),
        Err(Error::GlobalGroupProtected)
    ));

    let other = new_service(ModelKind::Turbine);
    let foreign = block_on(other.model_manager().global_group()).unwrap();
    assert_eq!(foreign.name(), "global");
    assert_eq!(other.store().entity_count(EntityKind::Group), 1);
}

#[test]
fn global_group_is_found_when_already_stored() {
    let store = MemoryStore::new();
    let seed = block_on(
        SecurityServiceBuilder::new(store.clone())
            .model(ModelKind::Turbine)
            .build(),
    )
    .unwrap();
    let stored = add_group(&seed, "GLOBAL");

    let service = block_on(
        SecurityServiceBuilder::new(store.clone())
            .model(ModelKind::Turbine)
            .build(),
    )
    .unwrap();
    let global = block_on(service.model_manager().global_group()).unwrap();
    assert_eq!(global, stored);
    assert_eq!(store.entity_count(EntityKind::Group), 1);
}

#[test]
fn unknown_entity_grant_leaves_no_edge() {
    let service = new_service(ModelKind::Simple);
    let dev = add_group(&service, "dev");
    let ghost = block_on(service.role_manager().instance_named("ghost")).unwrap();
    let model = service.model_manager();

    let err = block_on(model.grant_group_role(&dev, &ghost)).expect_err("transient role");
    assert!(matches!(
        err,
        Error::UnknownEntity {
            kind: EntityKind::Role,
            ..
        }
    ));
    assert_eq!(service.store().relationship_count(), 0);
    assert!(block_on(model.roles_of(&dev)).unwrap().is_empty());
}

#[test]
fn entity_from_another_model_is_rejected() {
    let service = new_service(ModelKind::Simple);
    let dev = add_group(&service, "dev");
    let stray = User::new(ModelKind::Turbine, "stray");

    assert!(matches!(
        block_on(service.user_manager().add(stray)),
        Err(Error::ModelMismatch { .. })
    ));
    let turbine_user = add_user(&new_service(ModelKind::Turbine), "clint");
    assert!(matches!(
        block_on(service.model_manager().grant_user_group(&turbine_user, &dev)),
        Err(Error::ModelMismatch { .. })
    ));
}

#[test]
fn hydration_restores_relationships() {
    let store = MemoryStore::new();
    {
        let service = block_on(
            SecurityServiceBuilder::new(store.clone())
                .model(ModelKind::Simple)
                .build(),
        )
        .unwrap();
        let clint = add_user(&service, "clint");
        let dev = add_group(&service, "dev");
        let admin = add_role(&service, "admin");
        block_on(service.model_manager().grant_user_group(&clint, &dev)).unwrap();
        block_on(service.model_manager().grant_group_role(&dev, &admin)).unwrap();
    }

    let service = block_on(
        SecurityServiceBuilder::new(store)
            .model(ModelKind::Simple)
            .build(),
    )
    .unwrap();
    let clint = block_on(service.user_manager().by_name("clint")).unwrap();
    let dev = block_on(service.group_manager().by_name("dev")).unwrap();
    let acl = block_on(service.access_control_list(&clint)).unwrap();

    assert!(acl.has_role_in_group("admin", "dev"));
    assert_eq!(
        block_on(service.model_manager().revoke_user_group(&clint, &dev)).unwrap(),
        RevokeOutcome::Revoked
    );
}

/// Wraps a memory store and fails selected writes on demand.
#[derive(Clone, Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_save_relationship: Arc<AtomicBool>,
    fail_delete_relationship: Arc<AtomicBool>,
    fail_delete_entity: Arc<AtomicBool>,
}

fn refuse(flag: &AtomicBool, what: &str) -> Result<(), StoreError> {
    if flag.load(Ordering::SeqCst) {
        return Err(format!("{what} refused").into());
    }
    Ok(())
}

#[async_trait]
impl EntityStore for FlakyStore {
    async fn load_entity(
        &self,
        kind: EntityKind,
        lookup: EntityLookup,
    ) -> Result<Option<EntityRecord>, StoreError> {
        self.inner.load_entity(kind, lookup).await
    }

    async fn load_entities(&self, kind: EntityKind) -> Result<Vec<EntityRecord>, StoreError> {
        self.inner.load_entities(kind).await
    }

    async fn save_entity(&self, record: EntityRecord) -> Result<EntityId, StoreError> {
        self.inner.save_entity(record).await
    }

    async fn delete_entity(&self, kind: EntityKind, id: EntityId) -> Result<(), StoreError> {
        refuse(&self.fail_delete_entity, "delete_entity")?;
        self.inner.delete_entity(kind, id).await
    }
}

#[async_trait]
impl RelationshipStore for FlakyStore {
    async fn load_relationships(
        &self,
        kind: RelationshipKind,
        entity_kind: EntityKind,
        id: EntityId,
    ) -> Result<Vec<Relationship>, StoreError> {
        self.inner.load_relationships(kind, entity_kind, id).await
    }

    async fn save_relationship(&self, relationship: Relationship) -> Result<(), StoreError> {
        refuse(&self.fail_save_relationship, "save_relationship")?;
        self.inner.save_relationship(relationship).await
    }

    async fn delete_relationship(&self, relationship: Relationship) -> Result<(), StoreError> {
        refuse(&self.fail_delete_relationship, "delete_relationship")?;
        self.inner.delete_relationship(relationship).await
    }
}

fn flaky_service(model: ModelKind) -> (FlakyStore, SecurityService<FlakyStore>) {
    let store = FlakyStore::default();
    let service =
        block_on(SecurityServiceBuilder::new(store.clone()).model(model).build()).unwrap();
    (store, service)
}

#[test]
fn failed_grant_rolls_back_the_index() {
    let (store, service) = flaky_service(ModelKind::Simple);
    let clint = add_user(&service, "clint");
    let dev = add_group(&service, "dev");
    let model = service.model_manager();

    store.fail_save_relationship.store(true, Ordering::SeqCst);
    assert!(matches!(
        block_on(model.grant_user_group(&clint, &dev)),
        Err(Error::DataBackend(_))
    ));
    assert!(block_on(model.groups_of(&clint)).unwrap().is_empty());
    assert_eq!(store.inner.relationship_count(), 0);

    store.fail_save_relationship.store(false, Ordering::SeqCst);
    block_on(model.grant_user_group(&clint, &dev)).unwrap();
    assert_eq!(block_on(model.groups_of(&clint)).unwrap().len(), 1);
}

#[test]
fn failed_revoke_keeps_the_edge() {
    let (store, service) = flaky_service(ModelKind::Simple);
    let admin = add_role(&service, "admin");
    let deploy = add_permission(&service, "deploy");
    let model = service.model_manager();
    block_on(model.grant_role_permission(&admin, &deploy)).unwrap();

    store.fail_delete_relationship.store(true, Ordering::SeqCst);
    assert!(matches!(
        block_on(model.revoke_role_permission(&admin, &deploy)),
        Err(Error::DataBackend(_))
    ));
    assert!(block_on(model.permissions_of(&admin)).unwrap().contains(&deploy));
    assert_eq!(store.inner.relationship_count(), 1);
}

#[test]
fn failed_cascade_restores_every_edge() {
    let (store, service) = flaky_service(ModelKind::Simple);
    let clint = add_user(&service, "clint");
    let dev = add_group(&service, "dev");
    let ops = add_group(&service, "ops");
    let model = service.model_manager();
    block_on(model.grant_user_group(&clint, &dev)).unwrap();
    block_on(model.grant_user_group(&clint, &ops)).unwrap();

    store.fail_delete_entity.store(true, Ordering::SeqCst);
    assert!(matches!(
        block_on(service.user_manager().remove(&clint)),
        Err(Error::DataBackend(_))
    ));

    assert_eq!(store.inner.relationship_count(), 2);
    assert_eq!(block_on(model.groups_of(&clint)).unwrap().len(), 2);
    assert!(block_on(service.user_manager().contains(&clint)).unwrap());
}

#[test]
fn concurrent_grants_all_land() {
    let service = Arc::new(new_service(ModelKind::Simple));
    let dev = add_group(&service, "dev");
    let users: Vec<User> = (0..8).map(|i| add_user(&service, &format!("user_{i}"))).collect();

    let joins: Vec<_> = users
        .into_iter()
        .map(|user| {
            let service = Arc::clone(&service);
            let dev = dev.clone();
            std::thread::spawn(move || {
                block_on(service.model_manager().grant_user_group(&user, &dev)).unwrap();
            })
        })
        .collect();
    for join in joins {
        join.join().expect("thread panicked");
    }

    assert_eq!(block_on(service.model_manager().users_of(&dev)).unwrap().len(), 8);
    assert_eq!(service.store().relationship_count(), 8);
}
