//! Lifecycle and failure-containment tests for the module registry.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use module_host::config::ConfigStore;
use module_host::registry::Hook;
use module_host::{ModuleFault, ModuleRegistry, ModuleState, RegistryError, ServerConfig};

mod common;

use common::{all_unique, run_handler, snapshot, ExclusiveModule, HookMonitor, Journal, ScriptedModule};

fn registry_with(modules: Vec<ScriptedModule>) -> ModuleRegistry {
    let registry = ModuleRegistry::new();
    for module in modules {
        registry.register(module.boxed()).unwrap();
    }
    registry
}

#[test]
fn handler_before_activation_is_not_active() {
    let journal = Journal::new();
    let registry = registry_with(vec![ScriptedModule::new("a", &journal)]);

    let err = registry.create_handler("a").err().unwrap();
    assert_eq!(err, RegistryError::ModuleNotActive("a".into()));
    assert!(journal.entries().is_empty());
}

#[test]
fn activation_and_deactivation_move_state() {
    let journal = Journal::new();
    let registry = registry_with(vec![ScriptedModule::new("a", &journal)]);
    let cfg = snapshot(1);

    assert_eq!(registry.state("a"), Some(ModuleState::Inactive));
    registry.activate("a", &cfg).unwrap();
    assert_eq!(registry.state("a"), Some(ModuleState::Active));
    registry.deactivate("a").unwrap();
    assert_eq!(registry.state("a"), Some(ModuleState::Inactive));

    // Re-activation is allowed after a full cycle.
    registry.activate("a", &cfg).unwrap();
    assert_eq!(registry.snapshot()[0].activations, 2);
}

#[test]
fn duplicate_registration_keeps_first_module() {
    let first = Journal::new();
    let second = Journal::new();
    let registry = ModuleRegistry::new();

    registry.register(ScriptedModule::new("a", &first).boxed()).unwrap();
    let err = registry
        .register(ScriptedModule::new("a", &second).boxed())
        .unwrap_err();
    assert_eq!(err, RegistryError::DuplicateModuleName("a".into()));
    assert_eq!(registry.len(), 1);

    registry.activate_all(&snapshot(1));
    assert_eq!(first.calls("activate"), vec!["a"]);
    assert!(second.entries().is_empty());
}

#[test]
fn activate_all_tolerates_a_faulting_module() {
    let journal = Journal::new();
    let registry = registry_with(vec![
        ScriptedModule::new("a", &journal),
        ScriptedModule::new("b", &journal).fault_on(Hook::Activate),
        ScriptedModule::new("c", &journal),
    ]);

    let report = registry.activate_all(&snapshot(1));

    assert_eq!(journal.calls("activate"), vec!["a", "b", "c"]);
    assert_eq!(report.succeeded, vec!["a".to_string(), "c".to_string()]);
    assert_eq!(report.failed_modules(), vec!["b"]);
    assert!(matches!(report.failed[0].fault, ModuleFault::Resource(_)));
    assert_eq!(registry.state("a"), Some(ModuleState::Active));
    assert_eq!(registry.state("b"), Some(ModuleState::Inactive));
    assert_eq!(registry.state("c"), Some(ModuleState::Active));
    assert_eq!(registry.create_handler("b").err(), Some(RegistryError::ModuleNotActive("b".into())));
}

#[test]
fn panicking_activation_is_contained() {
    let journal = Journal::new();
    let registry = registry_with(vec![
        ScriptedModule::new("a", &journal).panic_on(Hook::Activate),
        ScriptedModule::new("b", &journal),
    ]);

    let report = registry.activate_all(&snapshot(1));

    assert_eq!(report.failed_modules(), vec!["a"]);
    assert!(matches!(report.failed[0].fault, ModuleFault::Panicked(_)));
    assert_eq!(registry.state("a"), Some(ModuleState::Inactive));
    assert_eq!(registry.state("b"), Some(ModuleState::Active));

    // The registry stays usable after the panic.
    registry.activate("a", &snapshot(1)).unwrap_err();
    assert!(registry.create_handler("b").is_ok());
}

#[test]
fn deactivate_all_runs_in_reverse_registration_order() {
    let journal = Journal::new();
    let registry = registry_with(vec![
        ScriptedModule::new("a", &journal),
        ScriptedModule::new("b", &journal),
        ScriptedModule::new("c", &journal),
    ]);

    registry.activate_all(&snapshot(1));
    let report = registry.deactivate_all();

    assert_eq!(journal.calls("activate"), vec!["a", "b", "c"]);
    assert_eq!(journal.calls("deactivate"), vec!["c", "b", "a"]);
    assert!(report.is_clean());
    assert_eq!(registry.active_count(), 0);
}

#[test]
fn deactivate_all_continues_past_faults_and_skips_inactive() {
    let journal = Journal::new();
    let registry = registry_with(vec![
        ScriptedModule::new("a", &journal),
        ScriptedModule::new("b", &journal).panic_on(Hook::Deactivate),
        ScriptedModule::new("c", &journal).fault_on(Hook::Activate),
    ]);

    registry.activate_all(&snapshot(1));
    let report = registry.deactivate_all();

    assert_eq!(journal.calls("deactivate"), vec!["b", "a"]);
    assert_eq!(report.failed_modules(), vec!["b"]);
    assert_eq!(report.skipped, vec!["c".to_string()]);
    // A faulting deactivation still leaves the module Inactive.
    assert_eq!(registry.state("b"), Some(ModuleState::Inactive));
    assert_eq!(registry.state("a"), Some(ModuleState::Inactive));
}

#[test]
fn config_change_reaches_only_active_modules() {
    let journal = Journal::new();
    let registry = registry_with(vec![
        ScriptedModule::new("a", &journal),
        ScriptedModule::new("b", &journal).fault_on(Hook::Activate),
        ScriptedModule::new("c", &journal).fault_on(Hook::ConfigChange),
        ScriptedModule::new("d", &journal),
    ]);

    registry.activate_all(&snapshot(1));
    let report = registry.broadcast_config_change(&snapshot(2));

    assert_eq!(journal.calls("config_change"), vec!["a", "c", "d"]);
    assert_eq!(report.succeeded, vec!["a".to_string(), "d".to_string()]);
    assert_eq!(report.failed_modules(), vec!["c"]);
    assert_eq!(report.skipped, vec!["b".to_string()]);
    // A rejected change leaves the module Active on its old snapshot.
    assert_eq!(registry.state("c"), Some(ModuleState::Active));

    let statuses = registry.snapshot();
    let generation = |name: &str| {
        statuses
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.config_generation)
            .unwrap()
    };
    assert_eq!(generation("a"), 2);
    assert_eq!(generation("c"), 1);
}

#[tokio::test]
async fn in_flight_handlers_keep_their_snapshot() {
    let journal = Journal::new();
    let registry = registry_with(vec![ScriptedModule::new("a", &journal)]);
    registry.activate_all(&snapshot(1));

    let before = registry.create_handler("a").unwrap();
    registry.broadcast_config_change(&snapshot(2));
    let after = registry.create_handler("a").unwrap();

    assert_eq!(run_handler(before).await, "id=0 generation=1");
    assert_eq!(run_handler(after).await, "id=1 generation=2");
}

#[test]
fn handler_faults_become_creation_failures() {
    let journal = Journal::new();
    let registry = registry_with(vec![
        ScriptedModule::new("faulty", &journal).fault_on(Hook::NewRequestHandler),
        ScriptedModule::new("panicky", &journal).panic_on(Hook::NewRequestHandler),
    ]);
    registry.activate_all(&snapshot(1));

    match registry.create_handler("faulty").err() {
        Some(RegistryError::HandlerCreationFailed { module, fault }) => {
            assert_eq!(module, "faulty");
            assert!(matches!(fault, ModuleFault::Resource(_)));
        }
        other => panic!("unexpected result: {other:?}"),
    }

    match registry.create_handler("panicky").err() {
        Some(RegistryError::HandlerCreationFailed { fault, .. }) => {
            assert!(matches!(fault, ModuleFault::Panicked(_)));
        }
        other => panic!("unexpected result: {other:?}"),
    }

    // Creation faults do not change lifecycle state.
    assert_eq!(registry.state("panicky"), Some(ModuleState::Active));
    let status = &registry.snapshot()[1];
    assert_eq!(status.last_fault.as_ref().map(|f| f.hook), Some(Hook::NewRequestHandler));
}

#[test]
fn unknown_module_is_not_found() {
    let registry = ModuleRegistry::new();
    assert_eq!(
        registry.create_handler("ghost").err(),
        Some(RegistryError::ModuleNotFound("ghost".into()))
    );
    assert_eq!(registry.deactivate("ghost"), Err(RegistryError::ModuleNotFound("ghost".into())));
}

#[test]
fn concurrent_handler_creation_from_threads() {
    let journal = Journal::new();
    let registry = Arc::new(registry_with(vec![ScriptedModule::new("a", &journal)]));
    registry.activate_all(&snapshot(1));

    let handlers_per_thread = 50;
    let threads = 8;
    let created = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..threads)
            .map(|_| {
                let registry = registry.clone();
                scope.spawn(move || {
                    (0..handlers_per_thread)
                        .map(|_| registry.create_handler("a").is_ok())
                        .filter(|ok| *ok)
                        .count()
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).sum::<usize>()
    });

    assert_eq!(created, threads * handlers_per_thread);
    assert_eq!(registry.snapshot()[0].handlers_created, created as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_handlers_are_independent() {
    let journal = Journal::new();
    let registry = Arc::new(registry_with(vec![ScriptedModule::new("a", &journal)]));
    registry.activate_all(&snapshot(1));

    let mut tasks = Vec::new();
    for _ in 0..64 {
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move {
            let handler = registry.create_handler("a").unwrap();
            run_handler(handler).await
        }));
    }

    let mut bodies = Vec::new();
    for task in tasks {
        bodies.push(task.await.unwrap());
    }

    assert_eq!(bodies.len(), 64);
    assert!(all_unique(bodies.iter()));
    assert!(bodies.iter().all(|b| b.ends_with("generation=1")));
}

#[test]
fn lifecycle_hooks_on_one_module_never_overlap() {
    let monitor = Arc::new(HookMonitor::default());
    let registry = ModuleRegistry::new();
    registry
        .register(Box::new(ExclusiveModule::new("a", &monitor)))
        .unwrap();
    registry.activate_all(&snapshot(1));

    let inconsistent = AtomicUsize::new(0);
    std::thread::scope(|scope| {
        for worker in 0..4u64 {
            let registry = &registry;
            let inconsistent = &inconsistent;
            scope.spawn(move || {
                for round in 0..100u64 {
                    match (worker + round) % 4 {
                        0 => {
                            registry.broadcast_config_change(&snapshot(round + 2));
                        }
                        1 => {
                            let _ = registry.deactivate("a");
                        }
                        2 => {
                            let _ = registry.activate("a", &snapshot(round + 2));
                        }
                        _ => {
                            // An Active module must always hold a config.
                            if let Err(RegistryError::HandlerCreationFailed { .. }) = registry.create_handler("a") {
                                inconsistent.fetch_add(1, Ordering::SeqCst);
                            }
                        }
                    }
                }
            });
        }
    });

    assert!(monitor.hooks_run.load(Ordering::SeqCst) > 1);
    assert_eq!(monitor.overlaps.load(Ordering::SeqCst), 0);
    assert_eq!(monitor.handlers_during_hook.load(Ordering::SeqCst), 0);
    assert_eq!(inconsistent.load(Ordering::SeqCst), 0);

    let active = registry.state("a") == Some(ModuleState::Active);
    assert_eq!(monitor.balance.load(Ordering::SeqCst), i64::from(active));
    assert_eq!(registry.create_handler("a").is_ok(), active);
}

#[test]
fn single_activation_uses_the_snapshot_published_while_it_waited() {
    let journal = Journal::new();
    let registry = Arc::new(ModuleRegistry::new());
    registry
        .register(
            ScriptedModule::new("a", &journal)
                .delay_on(Hook::Activate, Duration::from_millis(300))
                .fault_once_on(Hook::Activate)
                .boxed(),
        )
        .unwrap();
    let store = Arc::new(ConfigStore::new(ServerConfig::default()));

    // First activation holds the module's lifecycle lock, then faults.
    let first = {
        let (registry, store) = (registry.clone(), store.clone());
        std::thread::spawn(move || registry.activate_current("a", &store))
    };
    std::thread::sleep(Duration::from_millis(50));

    // Second activation queues behind it while the store is still on generation 1.
    let second = {
        let (registry, store) = (registry.clone(), store.clone());
        std::thread::spawn(move || registry.activate_current("a", &store))
    };
    std::thread::sleep(Duration::from_millis(50));

    // A reload publishes and broadcasts while the module is still Inactive.
    let published = store.publish(ServerConfig::default());
    registry.broadcast_config_change(&published);

    assert!(matches!(
        first.join().unwrap(),
        Err(RegistryError::Lifecycle { hook: Hook::Activate, .. })
    ));
    second.join().unwrap().unwrap();

    assert_eq!(published.generation, 2);
    assert_eq!(registry.state("a"), Some(ModuleState::Active));
    assert_eq!(registry.snapshot()[0].config_generation, 2);
}
