// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use echo_core::{FunctionTask, Task, TaskCore, TaskExt, TaskGroup, TaskManager, TaskPriority};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Trace = Arc<Mutex<Vec<(String, Duration)>>>;

/// A subsystem stand-in recording every update it receives.
struct TracedTask {
    core: TaskCore,
    trace: Trace,
}

impl TracedTask {
    fn new(name: &str, priority: TaskPriority, trace: &Trace) -> Arc<Self> {
        Arc::new(Self {
            core: TaskCore::new(name, priority),
            trace: Arc::clone(trace),
        })
    }
}

impl Task for TracedTask {
    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn update(&self, dt: Duration) {
        self.trace.lock().unwrap().push((self.core.name(), dt));
    }
}

/// Refuses to start unless its collaborator was provided.
struct CursorInput {
    core: TaskCore,
    has_camera: AtomicBool,
    start_attempts: AtomicUsize,
    updates: AtomicUsize,
}

impl CursorInput {
    fn new(priority: TaskPriority) -> Arc<Self> {
        Arc::new(Self {
            core: TaskCore::new("cursor", priority),
            has_camera: AtomicBool::new(false),
            start_attempts: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
        })
    }
}

impl Task for CursorInput {
    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn update(&self, _dt: Duration) {
        self.updates.fetch_add(1, Ordering::SeqCst);
    }

    fn on_start(&self) -> bool {
        self.start_attempts.fetch_add(1, Ordering::SeqCst);
        self.has_camera.load(Ordering::SeqCst)
    }
}

fn names(trace: &Trace) -> Vec<String> {
    trace.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
}

#[test]
fn test_priority_order_and_pause() {
    // --- 1. ARRANGE ---
    let trace = Trace::default();
    let manager = TaskManager::new("frame");
    let b = TracedTask::new("B", 20, &trace);
    let a = TracedTask::new("A", 10, &trace);
    manager.add_task(b.clone());
    manager.add_task(a.clone());

    // --- 2. ACT ---
    manager.update_tasks(Duration::from_secs(1));

    // --- 3. ASSERT ---
    assert_eq!(names(&trace), vec!["A", "B"]);
    assert!(trace
        .lock()
        .unwrap()
        .iter()
        .all(|(_, dt)| *dt == Duration::from_secs(1)));

    trace.lock().unwrap().clear();
    a.pause(false, false);
    manager.update_tasks(Duration::from_secs(1));
    assert_eq!(names(&trace), vec!["B"]);
}

#[test]
fn test_counts_follow_add_and_remove() {
    let trace = Trace::default();
    let manager = TaskManager::new("counts");
    let tasks: Vec<_> = (0..5)
        .map(|i| TracedTask::new(&format!("t{i}"), i, &trace))
        .collect();

    for (added, task) in tasks.iter().enumerate() {
        assert!(manager.add_task(task.clone()));
        assert_eq!(manager.number_of_tasks(false), added + 1);
    }
    assert!(manager.remove_task(tasks[2].as_ref()));
    assert!(!manager.remove_task(tasks[2].as_ref()));
    assert_eq!(manager.number_of_tasks(false), 4);

    let group = Arc::new(TaskGroup::new("group", 100));
    group.tasks().add_task(tasks[2].clone());
    manager.add_task(group.clone());
    assert_eq!(manager.number_of_tasks(false), 5);
    assert_eq!(manager.number_of_tasks(true), 6);
}

#[test]
fn test_start_tasks_keeps_refusing_tasks_registered() {
    // --- 1. ARRANGE ---
    let trace = Trace::default();
    let manager = TaskManager::new("startup");
    let ok = TracedTask::new("renderer", 1, &trace);
    let cursor = CursorInput::new(2);
    manager.add_task(ok.clone());
    manager.add_task(cursor.clone());

    // --- 2. ACT ---
    let all_started = manager.start_tasks();

    // --- 3. ASSERT ---
    assert!(!all_started);
    assert!(ok.is_started());
    assert!(!cursor.is_started());
    assert!(manager.contains(cursor.as_ref()));

    // Providing the collaborator lets a second pass succeed, without
    // restarting the task that already runs.
    cursor.has_camera.store(true, Ordering::SeqCst);
    assert!(manager.start_tasks());
    assert!(cursor.is_started());
    assert_eq!(cursor.start_attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn test_active_counts_after_start() {
    let trace = Trace::default();
    let root = TaskManager::new("root");
    let group = Arc::new(TaskGroup::new("audio", 50));
    let streams: Vec<_> = (0..3)
        .map(|i| TracedTask::new(&format!("stream{i}"), i, &trace))
        .collect();
    for stream in &streams {
        group.tasks().add_task(stream.clone());
    }
    let input = TracedTask::new("input", 1, &trace);
    root.add_task(group.clone());
    root.add_task(input.clone());

    assert!(root.start_tasks());
    assert!(streams.iter().all(|s| s.is_started()));
    assert_eq!(root.number_of_active_tasks(true), 5);

    streams[0].pause(false, false);
    input.pause(false, false);
    assert_eq!(root.number_of_active_tasks(false), 1);
    assert_eq!(root.number_of_active_tasks(true), 3);
}

#[test]
fn test_task_in_two_managers_is_updated_by_both() {
    let trace = Trace::default();
    let render = TaskManager::new("render");
    let logic = TaskManager::new("logic");
    let shared = TracedTask::new("shared", 1, &trace);
    render.add_task(shared.clone());
    logic.add_task(shared.clone());

    render.update_tasks(Duration::from_millis(16));
    logic.update_tasks(Duration::from_millis(16));
    assert_eq!(names(&trace).len(), 2);

    // Leaving one manager does not affect the other.
    render.remove_task(shared.as_ref());
    assert_eq!(shared.core().number_of_task_managers(), 1);
    assert_eq!(shared.single_task_manager(), Some(logic.clone()));
}

#[test]
fn test_task_removed_earlier_in_the_pass_is_skipped() {
    // --- 1. ARRANGE ---
    let trace = Trace::default();
    let manager = TaskManager::new("frame");
    let remover = {
        let manager = manager.clone();
        Arc::new(FunctionTask::new("remover", 1, move |_| {
            manager.remove_task_by_name("victim");
        }))
    };
    let victim = TracedTask::new("victim", 2, &trace);
    let after = TracedTask::new("after", 3, &trace);
    manager.add_task(remover.clone());
    manager.add_task(victim.clone());
    manager.add_task(after.clone());

    // --- 2. ACT ---
    manager.update_tasks(Duration::from_millis(16));

    // --- 3. ASSERT ---
    assert_eq!(names(&trace), vec!["after"]);
    assert!(!manager.contains(victim.as_ref()));
    assert_eq!(victim.core().number_of_task_managers(), 0);
}

#[test]
fn test_task_paused_earlier_in_the_pass_is_skipped() {
    // --- 1. ARRANGE ---
    let trace = Trace::default();
    let manager = TaskManager::new("frame");
    let pauser = {
        let manager = manager.clone();
        Arc::new(FunctionTask::new("pauser", 1, move |_| {
            if let Some(victim) = manager.find_task("victim", false) {
                victim.pause(false, false);
            }
        }))
    };
    let victim = TracedTask::new("victim", 2, &trace);
    let after = TracedTask::new("after", 3, &trace);
    manager.add_task(pauser.clone());
    manager.add_task(victim.clone());
    manager.add_task(after.clone());

    // --- 2. ACT ---
    manager.update_tasks(Duration::from_millis(16));

    // --- 3. ASSERT ---
    assert_eq!(names(&trace), vec!["after"]);
    assert!(victim.is_paused());
    assert_eq!(manager.number_of_active_tasks(false), 2);
}

#[test]
fn test_task_added_during_a_pass_runs_from_the_next_pass() {
    // --- 1. ARRANGE ---
    let trace = Trace::default();
    let manager = TaskManager::new("frame");
    let late = TracedTask::new("late", 0, &trace);
    let spawner = {
        let manager = manager.clone();
        let late = late.clone();
        let added = AtomicBool::new(false);
        Arc::new(FunctionTask::new("spawner", 1, move |_| {
            if !added.swap(true, Ordering::SeqCst) {
                manager.add_shared_task(late.clone());
            }
        }))
    };
    let anchor = TracedTask::new("anchor", 2, &trace);
    manager.add_task(spawner.clone());
    manager.add_task(anchor.clone());
    assert!(manager.start_tasks());

    // --- 2. ACT ---
    manager.update_tasks(Duration::from_millis(16));
    let first_pass = names(&trace);
    manager.update_tasks(Duration::from_millis(16));

    // --- 3. ASSERT ---
    assert_eq!(first_pass, vec!["anchor"]);
    assert_eq!(names(&trace), vec!["anchor", "late", "anchor"]);
    // The manager was running, so the late task was started when added.
    assert!(late.is_started());
}

#[test]
fn test_running_manager_starts_added_tasks() {
    // --- 1. ARRANGE ---
    let trace = Trace::default();
    let manager = TaskManager::new("runtime");
    assert!(!manager.is_running());
    assert!(manager.start_tasks());
    assert!(manager.is_running());

    // --- 2. ACT ---
    let renderer = TracedTask::new("renderer", 1, &trace);
    let cursor = CursorInput::new(2);
    assert!(manager.add_task(renderer.clone()));
    assert!(manager.add_task(cursor.clone()));
    manager.update_tasks(Duration::from_millis(16));

    // --- 3. ASSERT ---
    assert!(renderer.is_started());
    assert_eq!(names(&trace), vec!["renderer"]);
    // The vetoed task stays registered but never receives an update.
    assert!(manager.contains(cursor.as_ref()));
    assert!(!cursor.is_started());
    assert_eq!(cursor.start_attempts.load(Ordering::SeqCst), 1);
    assert_eq!(cursor.updates.load(Ordering::SeqCst), 0);

    cursor.has_camera.store(true, Ordering::SeqCst);
    assert!(manager.start_tasks());
    manager.update_tasks(Duration::from_millis(16));
    assert_eq!(cursor.updates.load(Ordering::SeqCst), 1);

    manager.stop_tasks();
    assert!(!manager.is_running());
    assert!(!renderer.is_started());
}

#[test]
fn test_started_group_starts_children_added_later() {
    let trace = Trace::default();
    let root = TaskManager::new("root");
    let group = Arc::new(TaskGroup::new("physics", 10));
    root.add_task(group.clone());
    assert!(root.start_tasks());
    assert!(group.is_started());

    let solver = TracedTask::new("solver", 1, &trace);
    group.tasks().add_task(solver.clone());

    assert!(solver.is_started());
    root.update_tasks(Duration::from_millis(16));
    assert_eq!(names(&trace), vec!["solver"]);
}

#[test]
fn test_active_count_survives_pause_racing_with_registration() {
    // --- 1. ARRANGE ---
    let trace = Trace::default();
    let manager = TaskManager::new("shared");
    let task = TracedTask::new("contended", 1, &trace);

    // --- 2. ACT ---
    let toggler = {
        let task = task.clone();
        std::thread::spawn(move || {
            for _ in 0..2000 {
                task.pause(false, false);
                task.resume(false);
            }
            task.pause(false, false);
        })
    };
    for _ in 0..2000 {
        manager.add_task(task.clone());
        manager.remove_task(task.as_ref());
    }
    manager.add_task(task.clone());
    toggler.join().unwrap();

    // --- 3. ASSERT ---
    assert!(task.is_paused());
    assert_eq!(manager.number_of_tasks(false), 1);
    assert_eq!(manager.number_of_active_tasks(false), 0);

    task.resume(false);
    assert_eq!(manager.number_of_active_tasks(false), 1);
}
