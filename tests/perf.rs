#![cfg(feature = "memory-store")]

use futures::executor::block_on;
use rs_cms::{
    Category, ContentManager, ContentManagerBuilder, ContentNode, Domain, DomainName, GroupName,
    MemoryStore, PermissionRef, PermissionRule, PermissionSet, Resource, User, UserName,
};
use std::hint::black_box;
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::OffsetDateTime;

const REPEATS: usize = 5;

fn benchmark_sync<F>(name: &str, iterations: usize, mut op: F)
where
    F: FnMut(),
{
    let mut samples = Vec::with_capacity(REPEATS);

    for _ in 0..REPEATS {
        let start = Instant::now();
        for _ in 0..iterations {
            op();
        }
        samples.push(start.elapsed());
    }

    samples.sort_unstable();
    let median = samples[REPEATS / 2];
    let total_ms = median.as_secs_f64() * 1_000.0;
    let ns_per_op = median.as_secs_f64() * 1_000_000_000.0 / iterations as f64;
    let ops_per_sec = iterations as f64 / median.as_secs_f64();

    println!(
        "{name}: median={total_ms:.3} ms, ns/op={ns_per_op:.1}, ops/s={ops_per_sec:.0} (iters={iterations}, repeats={REPEATS})"
    );
}

fn benchmark_parallel<F>(name: &str, threads: usize, iterations_per_thread: usize, op_factory: F)
where
    F: Fn() -> Box<dyn FnMut() + Send> + Send + Sync + 'static,
{
    let op_factory = Arc::new(op_factory);
    let mut samples = Vec::with_capacity(REPEATS);

    for _ in 0..REPEATS {
        let start = Instant::now();
        let mut joins = Vec::with_capacity(threads);
        for _ in 0..threads {
            let factory = Arc::clone(&op_factory);
            joins.push(std::thread::spawn(move || {
                let mut op = factory();
                for _ in 0..iterations_per_thread {
                    op();
                }
            }));
        }
        for join in joins {
            join.join().expect("thread panicked");
        }
        samples.push(start.elapsed());
    }

    samples.sort_unstable();
    let median = samples[REPEATS / 2];
    let total_ops = threads * iterations_per_thread;
    let total_ms = median.as_secs_f64() * 1_000.0;
    let ns_per_op = median.as_secs_f64() * 1_000_000_000.0 / total_ops as f64;
    let ops_per_sec = total_ops as f64 / median.as_secs_f64();

    println!(
        "{name}: median={total_ms:.3} ms, ns/op={ns_per_op:.1}, ops/s={ops_per_sec:.0} (threads={threads}, total_ops={total_ops}, repeats={REPEATS})"
    );
}

fn domain() -> DomainName {
    DomainName::try_from("PERF").unwrap()
}

fn reader() -> User {
    User::new(domain(), UserName::try_from("reader").unwrap())
        .with_group(GroupName::try_from("readers").unwrap())
}

/// Builds a chain of `depth` published sections with a page at the bottom.
/// Only the top section carries rules.
fn setup_chain(depth: usize) -> (MemoryStore, ContentNode) {
    let store = MemoryStore::new();
    let root = User::superuser(UserName::try_from("root").unwrap());
    let admin = ContentManagerBuilder::new(store.clone()).admin(true).build();
    block_on(admin.save_domain(Some(&root), &mut Domain::new(domain()))).unwrap();

    let online = Some(OffsetDateTime::now_utc() - Duration::from_secs(3_600));
    let mut parent: Option<ContentNode> = None;
    for level in 0..depth {
        let mut section = match &parent {
            Some(parent) => ContentNode::child_of(parent, Category::Section, format!("s{level}")),
            None => ContentNode::new(domain(), Category::Section, "s0"),
        }
        .with_online(online, None);
        section.revision = 1;
        block_on(admin.save(Some(&root), &mut section)).unwrap();
        if level == 0 {
            let rules = vec![PermissionRule::for_group(GroupName::try_from("readers").unwrap()).read(true)];
            let set = PermissionSet::with_rules(PermissionRef::for_content(domain(), section.id), rules);
            block_on(admin.save_permissions(Some(&root), &set)).unwrap();
        }
        parent = Some(section);
    }

    let Some(parent) = parent else {
        panic!("depth must be positive");
    };
    let mut page = ContentNode::child_of(&parent, Category::Page, "index.html").with_online(online, None);
    page.revision = 1;
    page.set_element("body", Some("hello".to_string()));
    block_on(admin.save(Some(&root), &mut page)).unwrap();
    (store, page)
}

fn public(store: &MemoryStore) -> ContentManager<MemoryStore> {
    ContentManagerBuilder::new(store.clone()).build()
}

#[test]
#[ignore = "manual performance test; run with --ignored --nocapture"]
fn perf_content_reads_and_access() {
    let iterations = 50_000;
    let user = reader();

    let (store, page) = setup_chain(8);
    let manager = public(&store);
    benchmark_sync("get_content_depth8_cold_cache", iterations / 10, || {
        manager.reset();
        let result = block_on(manager.get_content(Some(&user), page.id)).unwrap();
        black_box(result);
    });

    let warm = block_on(manager.get_content(Some(&user), page.id)).unwrap();
    assert!(warm.is_some());
    benchmark_sync("get_content_depth8_hot_cache", iterations, || {
        let result = block_on(manager.get_content(Some(&user), page.id)).unwrap();
        black_box(result);
    });

    let (store, page) = setup_chain(32);
    let manager = ContentManagerBuilder::new(store).build();
    let warm = block_on(manager.access().has_read_access(Some(&user), Resource::Content(&page))).unwrap();
    assert!(warm);
    benchmark_sync("has_read_access_depth32_hot_cache", iterations, || {
        let result = block_on(manager.access().has_read_access(Some(&user), Resource::Content(&page)))
            .unwrap();
        black_box(result);
    });

    let threads = std::thread::available_parallelism()
        .map(|n| n.get().min(8))
        .unwrap_or(4);
    let iterations_per_thread = 20_000;

    let (store, page) = setup_chain(8);
    let manager = Arc::new(public(&store));
    let warm = block_on(manager.get_content(Some(&user), page.id)).unwrap();
    assert!(warm.is_some());

    let manager_for_parallel = Arc::clone(&manager);
    benchmark_parallel(
        "get_content_depth8_hot_cache_parallel",
        threads,
        iterations_per_thread,
        move || {
            let manager = Arc::clone(&manager_for_parallel);
            let user = reader();
            let id = page.id;
            Box::new(move || {
                let result = block_on(manager.get_content(Some(&user), id)).unwrap();
                black_box(result);
            })
        },
    );
}
