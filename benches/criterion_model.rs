#![cfg(all(feature = "criterion-bench", feature = "memory-store"))]

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use fulcrum_security::{
    Group, MemoryStore, ModelKind, Permission, Role, SecurityEntity, SecurityService,
    SecurityServiceBuilder, User,
};
use futures::executor::block_on;

fn build(model: ModelKind) -> SecurityService<MemoryStore> {
    block_on(SecurityServiceBuilder::new(MemoryStore::new()).model(model).build()).unwrap()
}

fn setup_simple_fanout(group_count: usize) -> (SecurityService<MemoryStore>, User) {
    let service = build(ModelKind::Simple);
    let user = block_on(service.user_manager().add(User::new(ModelKind::Simple, "bench_user")))
        .unwrap();
    let model = service.model_manager();

    for i in 0..group_count {
        let group = block_on(
            service
                .group_manager()
                .add(Group::new(ModelKind::Simple, format!("group_{i}"))),
        )
        .unwrap();
        let role = block_on(
            service
                .role_manager()
                .add(Role::new(ModelKind::Simple, format!("role_{i}"))),
        )
        .unwrap();
        let permission = block_on(
            service
                .permission_manager()
                .add(Permission::new(ModelKind::Simple, format!("perm_{i}"))),
        )
        .unwrap();
        block_on(model.grant_user_group(&user, &group)).unwrap();
        block_on(model.grant_group_role(&group, &role)).unwrap();
        block_on(model.grant_role_permission(&role, &permission)).unwrap();
    }

    (service, user)
}

fn setup_delegation_chain(depth: usize) -> (SecurityService<MemoryStore>, User) {
    let service = build(ModelKind::Dynamic);
    let model = service.model_manager();
    let group = block_on(
        service
            .group_manager()
            .add(Group::new(ModelKind::Dynamic, "board")),
    )
    .unwrap();

    let mut previous = block_on(
        service
            .user_manager()
            .add(User::new(ModelKind::Dynamic, "user_chain_0")),
    )
    .unwrap();
    block_on(model.grant_user_group(&previous, &group)).unwrap();
    for i in 1..=depth {
        let next = block_on(
            service
                .user_manager()
                .add(User::new(ModelKind::Dynamic, format!("user_chain_{i}"))),
        )
        .unwrap();
        block_on(model.grant_delegate(&previous, &next)).unwrap();
        previous = next;
    }

    (service, previous)
}

fn bench_acl_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("acl_group_fanout");
    group.sample_size(30);
    group.throughput(Throughput::Elements(1));

    for group_count in [1usize, 8, 32, 128] {
        let (service, user) = setup_simple_fanout(group_count);
        let id = BenchmarkId::from_parameter(group_count);
        group.bench_with_input(id, &group_count, |b, _| {
            b.iter(|| {
                let acl = block_on(service.access_control_list(&user)).unwrap();
                black_box(acl);
            });
        });
    }

    group.finish();
}

fn bench_delegation_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("acl_delegation_depth");
    group.sample_size(30);
    group.throughput(Throughput::Elements(1));

    for depth in [1usize, 4, 8, 16] {
        let (service, tail) = setup_delegation_chain(depth);
        let id = BenchmarkId::from_parameter(depth);
        group.bench_with_input(id, &depth, |b, _| {
            b.iter(|| {
                let acl = block_on(service.access_control_list(&tail)).unwrap();
                assert!(acl.in_group("board"));
                black_box(acl);
            });
        });
    }

    group.finish();
}

fn bench_grant_revoke(c: &mut Criterion) {
    let mut group = c.benchmark_group("grant_revoke");
    group.sample_size(30);
    group.throughput(Throughput::Elements(2));

    let (service, user) = setup_simple_fanout(8);
    let extra = block_on(
        service
            .group_manager()
            .add(Group::new(ModelKind::Simple, "extra")),
    )
    .unwrap();
    let model = service.model_manager();
    group.bench_function("user_group", |b| {
        b.iter(|| {
            block_on(model.grant_user_group(&user, &extra)).unwrap();
            let outcome = block_on(model.revoke_user_group(&user, &extra)).unwrap();
            black_box(outcome);
        });
    });

    let service = build(ModelKind::Turbine);
    let model = service.model_manager();
    let user = block_on(service.user_manager().add(User::new(ModelKind::Turbine, "clint"))).unwrap();
    let global = block_on(model.global_group()).unwrap();
    let role = block_on(service.role_manager().add(Role::new(ModelKind::Turbine, "admin"))).unwrap();
    assert_eq!(global.name(), "global");
    group.bench_function("user_group_role", |b| {
        b.iter(|| {
            block_on(model.grant_user_group_role(&user, &global, &role)).unwrap();
            let outcome = block_on(model.revoke_user_group_role(&user, &global, &role)).unwrap();
            black_box(outcome);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_acl_fanout,
    bench_delegation_depth,
    bench_grant_revoke
);
criterion_main!(benches);
