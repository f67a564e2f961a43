//! Scene pipeline integration tests

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use approx::assert_relative_eq;
use parking_lot::Mutex;

use crate::content::MemoryContent;
use crate::core::EngineSettings;
use crate::ecs::{
    ActorSet, Component, ComponentContext, ComponentKind, ComponentRef, ComponentRegistry, ComponentTypeId, EntityId,
};
use crate::events::{Event, EventTarget, MUTATION_EVENT};
use crate::foundation::math::{translation_of, Mat4, Transform, Vec3};
use crate::foundation::time::Clock;
use crate::physics::Simulator;
use crate::render::{
    Camera, DrawableRenderer, GeometryId, HeadlessDevice, Material, MaterialData, MaterialSurface, MeshComponent, Viewer,
};
use crate::scene::{EntityRecord, SceneDesc, SceneGraph, SceneSnapshot, SnapshotError};
use crate::spatial::{Aabb, Ray};

// ---------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------

fn settings() -> EngineSettings {
    let mut settings = EngineSettings::default();
    settings.workers.threads = 2;
    settings
}

fn scene_with(settings: EngineSettings) -> Arc<SceneGraph> {
    SceneGraph::new(SceneDesc::new(settings))
}

fn scene() -> Arc<SceneGraph> {
    scene_with(settings())
}

fn frame(scene: &Arc<SceneGraph>, index: u64) {
    scene.dispatch(&Clock::fixed(1.0 / 60.0, index as f32 / 60.0, index));
}

fn unit_mesh() -> Box<MeshComponent> {
    Box::new(MeshComponent::new(
        GeometryId(1),
        None,
        Some(Aabb::new(Vec3::repeat(-0.5), Vec3::repeat(0.5))),
    ))
}

fn spawn_box(scene: &SceneGraph, name: &str, position: Vec3) -> (EntityId, ComponentRef) {
    let id = scene.create_entity(name, None);
    scene.set_transform(id, Transform::from_position(position));
    let mesh = scene.add_component(id, unit_mesh());
    (id, mesh)
}

fn add_camera(scene: &SceneGraph) -> ComponentRef {
    let id = scene.create_entity("camera", None);
    let camera = scene.add_component(
        id,
        Box::new(Camera::for_scene(
            scene,
            Viewer::perspective(std::f32::consts::FRAC_PI_3, 1.0, 0.1, 1000.0),
        )),
    );
    scene.set_camera(Some(&camera));
    camera
}

fn mesh_owners(components: &[ComponentRef]) -> HashSet<EntityId> {
    components.iter().map(|component| component.owner()).collect()
}

#[derive(Default)]
struct Ticker {
    animated: Arc<AtomicUsize>,
    synchronized: Arc<AtomicUsize>,
}

impl Component for Ticker {
    crate::component_identity!();

    fn actors(&self) -> ActorSet {
        ActorSet::ANIMATE | ActorSet::SYNCHRONIZE
    }

    fn animate(&mut self, _ctx: &ComponentContext<'_>, _clock: &Clock) {
        self.animated.fetch_add(1, Ordering::SeqCst);
    }

    fn synchronize(&mut self, _ctx: &ComponentContext<'_>, _clock: &Clock) {
        self.synchronized.fetch_add(1, Ordering::SeqCst);
    }
}

impl ComponentKind for Ticker {
    const TYPE: ComponentTypeId = ComponentTypeId(950);
    const NAME: &'static str = "Ticker";
}

/// Removes its victim from inside `update`
struct Reaper {
    victim: Option<ComponentRef>,
}

impl Component for Reaper {
    crate::component_identity!();

    fn actors(&self) -> ActorSet {
        ActorSet::UPDATE
    }

    fn update(&mut self, ctx: &ComponentContext<'_>, _clock: &Clock) {
        if let Some(victim) = self.victim.take() {
            ctx.scene.remove_component(&victim);
        }
    }
}

impl ComponentKind for Reaper {
    const TYPE: ComponentTypeId = ComponentTypeId(951);
    const NAME: &'static str = "Reaper";
}

/// Cullable marker with its own storage
struct Marker;

impl Component for Marker {
    crate::component_identity!();

    fn actors(&self) -> ActorSet {
        ActorSet::CULLABLE
    }

    fn local_bounds(&self) -> Option<Aabb> {
        Some(Aabb::new(Vec3::repeat(-0.5), Vec3::repeat(0.5)))
    }
}

impl ComponentKind for Marker {
    const TYPE: ComponentTypeId = ComponentTypeId(952);
    const NAME: &'static str = "Marker";
}

/// Records activation notifications and messages
#[derive(Default)]
struct Watcher {
    activations: Arc<Mutex<Vec<Option<ComponentTypeId>>>>,
    messages: Arc<AtomicUsize>,
}

impl Component for Watcher {
    crate::component_identity!();

    fn actors(&self) -> ActorSet {
        ActorSet::MESSAGE
    }

    fn activate(&mut self, _ctx: &ComponentContext<'_>, added: Option<&ComponentRef>) {
        self.activations.lock().push(added.map(|component| component.component_type()));
    }

    fn message(&mut self, _ctx: &ComponentContext<'_>, _event: &Event) {
        self.messages.fetch_add(1, Ordering::SeqCst);
    }
}

impl ComponentKind for Watcher {
    const TYPE: ComponentTypeId = ComponentTypeId(953);
    const NAME: &'static str = "Watcher";
}

#[derive(Default)]
struct CountingSimulator {
    steps: usize,
    elapsed: f32,
}

impl Simulator for CountingSimulator {
    fn step(&mut self, delta: f32) {
        self.steps += 1;
        self.elapsed += delta;
    }
}

/// Removes its victim from inside `animate`
struct Pruner {
    victim: Option<ComponentRef>,
    removed_in_place: Arc<AtomicBool>,
}

impl Component for Pruner {
    crate::component_identity!();

    fn actors(&self) -> ActorSet {
        ActorSet::ANIMATE
    }

    fn animate(&mut self, ctx: &ComponentContext<'_>, _clock: &Clock) {
        if let Some(victim) = self.victim.take() {
            ctx.scene.remove_component(&victim);
            self.removed_in_place.store(!victim.is_active(), Ordering::SeqCst);
        }
    }
}

impl ComponentKind for Pruner {
    const TYPE: ComponentTypeId = ComponentTypeId(954);
    const NAME: &'static str = "Pruner";
}

/// Counts messages without opting into scene broadcasts
#[derive(Default)]
struct Mailbox {
    received: Arc<AtomicUsize>,
}

impl Component for Mailbox {
    crate::component_identity!();

    fn message(&mut self, _ctx: &ComponentContext<'_>, _event: &Event) {
        self.received.fetch_add(1, Ordering::SeqCst);
    }
}

impl ComponentKind for Mailbox {
    const TYPE: ComponentTypeId = ComponentTypeId(955);
    const NAME: &'static str = "Mailbox";
}

// ---------------------------------------------------------------------
// Cosmos maintenance
// ---------------------------------------------------------------------

#[test]
fn test_active_component_indexed_once_under_current_box() {
    let scene = scene();
    add_camera(&scene);
    let (id, mesh) = spawn_box(&scene, "crate", Vec3::new(4.0, 0.0, -10.0));
    let marker = scene.add_component(id, Box::new(Marker));
    frame(&scene, 1);

    let meshes = scene.storage(MeshComponent::TYPE).unwrap();
    let markers = scene.storage(Marker::TYPE).unwrap();
    let expected = scene.entity(id).unwrap().snapshot().bounds();

    assert_eq!(meshes.read().cosmos().bounds(&mesh.id()), Some(expected));
    assert_eq!(markers.read().cosmos().bounds(&marker.id()), Some(expected));
    assert!(!meshes.read().cosmos().contains(&marker.id()));
    assert!(!markers.read().cosmos().contains(&mesh.id()));
    assert!(mesh.is_indexed());

    scene.set_transform(id, Transform::from_position(Vec3::new(-4.0, 2.0, -20.0)));
    frame(&scene, 2);

    let moved = scene.entity(id).unwrap().snapshot().bounds();
    assert_relative_eq!(moved.center(), Vec3::new(-4.0, 2.0, -20.0), epsilon = 1e-5);
    assert_eq!(meshes.read().cosmos().bounds(&mesh.id()), Some(moved));
    assert_eq!(meshes.read().cosmos().len(), 1);
}

#[test]
fn test_finalize_caps_updates_and_converges() {
    let mut settings = settings();
    settings.scene.max_updates = 4;
    let scene = scene_with(settings);
    add_camera(&scene);
    for i in 0..10 {
        spawn_box(&scene, &format!("box{}", i), Vec3::new(i as f32 * 3.0, 0.0, -10.0));
    }

    frame(&scene, 1);
    assert_eq!(scene.pending_changes_of(MeshComponent::TYPE), 6);
    assert_eq!(scene.stats().cosmos_updates, 4);
    let storage = scene.storage(MeshComponent::TYPE).unwrap();
    assert_eq!(storage.read().cosmos().len(), 4);

    frame(&scene, 2);
    assert_eq!(scene.pending_changes_of(MeshComponent::TYPE), 2);

    frame(&scene, 3);
    assert_eq!(scene.pending_changes(), 0);
    assert_eq!(storage.read().cosmos().len(), 10);
}

#[test]
fn test_set_active_twice_is_noop() {
    let scene = scene();
    let (_, mesh) = spawn_box(&scene, "crate", Vec3::zeros());
    let storage = scene.storage(MeshComponent::TYPE).unwrap();
    assert!(mesh.is_active());
    assert_eq!(storage.read().len(), 1);

    scene.set_component_active(&mesh, true);
    assert!(mesh.is_active());
    assert_eq!(storage.read().len(), 1);

    scene.set_component_active(&mesh, false);
    scene.set_component_active(&mesh, false);
    assert!(!mesh.is_active());
    assert!(storage.read().is_empty());
}

#[test]
fn test_area_query_returns_exact_subset() {
    let scene = scene();
    add_camera(&scene);
    let ids: Vec<_> = (0..20)
        .map(|i| spawn_box(&scene, &format!("box{}", i), Vec3::new(i as f32 * 10.0, 0.0, 0.0)).0)
        .collect();
    frame(&scene, 1);

    let area = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(45.0, 1.0, 1.0));
    let found = mesh_owners(&scene.query_by_area(MeshComponent::TYPE, &area));
    let expected: HashSet<_> = ids[..5].iter().copied().collect();
    assert_eq!(found, expected);

    let hit = scene.query_by_position(MeshComponent::TYPE, Vec3::new(100.2, 0.0, 0.0));
    assert_eq!(mesh_owners(&hit), HashSet::from([ids[10]]));

    let near = scene.query_by_sphere(MeshComponent::TYPE, Vec3::new(190.0, 0.0, 0.0), 1.0);
    assert_eq!(mesh_owners(&near), HashSet::from([ids[19]]));

    let even = scene.query_by_match(MeshComponent::TYPE, |component| {
        component.entity().is_some_and(|entity| entity.name().ends_with('0'))
    });
    assert_eq!(mesh_owners(&even), HashSet::from([ids[0], ids[10]]));
}

#[test]
fn test_ray_hits_sorted_by_distance() {
    let scene = scene();
    add_camera(&scene);
    let (far, _) = spawn_box(&scene, "far", Vec3::new(0.0, 0.0, -30.0));
    let (near, _) = spawn_box(&scene, "near", Vec3::new(0.0, 0.0, -10.0));
    let (middle, _) = spawn_box(&scene, "middle", Vec3::new(0.0, 0.0, -20.0));
    spawn_box(&scene, "aside", Vec3::new(5.0, 0.0, -15.0));
    frame(&scene, 1);

    let hits = scene.query_by_ray(MeshComponent::TYPE, &Ray::new(Vec3::zeros(), -Vec3::z()));
    let owners: Vec<_> = hits.iter().map(|(component, _)| component.owner()).collect();
    assert_eq!(owners, vec![near, middle, far]);

    assert!(hits.windows(2).all(|pair| pair[0].1 <= pair[1].1));
    assert_relative_eq!(hits[0].1, 9.5, epsilon = 1e-4);
    assert_relative_eq!(hits[2].1, 29.5, epsilon = 1e-4);
}

#[test]
fn test_frustum_query_follows_moved_entity() {
    let scene = scene();
    add_camera(&scene);
    let frustum = Viewer::perspective(std::f32::consts::FRAC_PI_3, 1.0, 0.1, 1000.0)
        .frustum()
        .clone();

    let (d, _) = spawn_box(&scene, "d", Vec3::new(0.0, 0.0, 50.0));
    frame(&scene, 1);
    assert!(scene.query_by_frustum(MeshComponent::TYPE, &frustum).is_empty());

    scene.set_transform(d, Transform::from_position(Vec3::new(0.0, 0.0, -50.0)));
    frame(&scene, 2);
    let visible = scene.query_by_frustum(MeshComponent::TYPE, &frustum);
    assert_eq!(mesh_owners(&visible), HashSet::from([d]));
}

#[test]
fn test_clear_cosmos_rebuilds_on_finalize() {
    let scene = scene();
    add_camera(&scene);
    for i in 0..3 {
        spawn_box(&scene, &format!("box{}", i), Vec3::new(i as f32, 0.0, -5.0));
    }
    frame(&scene, 1);

    scene.clear_cosmos(MeshComponent::TYPE);
    scene.step_finalize();
    assert_eq!(scene.storage(MeshComponent::TYPE).unwrap().read().cosmos().len(), 3);
}

#[test]
fn test_indexing_waits_for_camera() {
    let scene = scene();
    spawn_box(&scene, "crate", Vec3::zeros());
    frame(&scene, 1);
    assert_eq!(scene.dirty_count(), 1);
    assert!(scene.storage(MeshComponent::TYPE).unwrap().read().cosmos().is_empty());

    add_camera(&scene);
    frame(&scene, 2);
    assert_eq!(scene.dirty_count(), 0);
    assert_eq!(scene.storage(MeshComponent::TYPE).unwrap().read().cosmos().len(), 1);
}

// ---------------------------------------------------------------------
// Transactions and lifecycle
// ---------------------------------------------------------------------

#[test]
fn test_transaction_runs_synchronously_when_idle() {
    let scene = scene();
    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    scene.transaction(move |_| flag.store(true, Ordering::SeqCst));
    assert!(ran.load(Ordering::SeqCst));
    assert_eq!(scene.pending_transactions(), 0);
}

#[test]
fn test_transaction_waits_for_rendering_queue() {
    let scene = scene();
    let (release, blocker) = crossbeam_channel::bounded::<()>(0);
    let render_task = scene.pool().spawn(move || {
        let _ = blocker.recv();
    });
    scene.watch_rendering(render_task);

    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    scene.transaction(move |_| flag.store(true, Ordering::SeqCst));
    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(scene.pending_transactions(), 1);

    release.send(()).unwrap();
    scene.step_transactions();
    assert!(ran.load(Ordering::SeqCst));
    assert_eq!(scene.pending_transactions(), 0);
}

#[test]
fn test_transaction_defers_while_events_pending() {
    let scene = scene();
    scene.push_event(Event::new("ping", EventTarget::Listeners));

    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    scene.transaction(move |_| flag.store(true, Ordering::SeqCst));
    assert!(!ran.load(Ordering::SeqCst));

    frame(&scene, 1);
    assert!(ran.load(Ordering::SeqCst));
}

#[test]
fn test_removal_inside_update_is_deferred() {
    let scene = scene();
    let target_entity = scene.create_entity("target", None);
    let ticker = Ticker::default();
    let synchronized = Arc::clone(&ticker.synchronized);
    let victim = scene.add_component(target_entity, Box::new(ticker));

    let reaper_entity = scene.create_entity("reaper", None);
    scene.add_component(reaper_entity, Box::new(Reaper { victim: Some(Arc::clone(&victim)) }));

    frame(&scene, 1);
    assert_eq!(synchronized.load(Ordering::SeqCst), 1);
    assert!(victim.is_active());
    assert_eq!(scene.pending_transactions(), 1);

    frame(&scene, 2);
    assert!(!victim.is_active());
    assert_eq!(synchronized.load(Ordering::SeqCst), 1);
    assert!(!scene.entity(target_entity).unwrap().has_component(Ticker::TYPE));
}

#[test]
fn test_removal_inside_animate_is_deferred() {
    let mut settings = settings();
    settings.workers.threads = 0;
    let scene = scene_with(settings);
    let target = scene.create_entity("target", None);
    let victim = scene.add_component(target, Box::new(Ticker::default()));

    let removed_in_place = Arc::new(AtomicBool::new(false));
    let pruner_entity = scene.create_entity("pruner", None);
    scene.add_component(
        pruner_entity,
        Box::new(Pruner {
            victim: Some(Arc::clone(&victim)),
            removed_in_place: Arc::clone(&removed_in_place),
        }),
    );

    frame(&scene, 1);
    assert!(!removed_in_place.load(Ordering::SeqCst));
    assert!(victim.is_active());
    assert_eq!(scene.pending_transactions(), 1);

    frame(&scene, 2);
    assert!(!victim.is_active());
    assert!(!scene.entity(target).unwrap().has_component(Ticker::TYPE));
}

#[test]
#[should_panic(expected = "worker task panicked")]
fn test_failed_task_survives_transaction_gate() {
    let mut settings = settings();
    settings.workers.threads = 0;
    let scene = scene_with(settings);
    scene.watch_processing(scene.pool().spawn(|| panic!("simulation diverged")));

    scene.transaction(|_| {});
    scene.step_finalize();
}

#[test]
fn test_entity_activation_waits_for_attach() {
    let scene = scene();
    let id = scene.create_entity("crate", None);
    assert!(scene.set_entity_active(id, false));
    let watcher = Watcher::default();
    let activations = Arc::clone(&watcher.activations);
    scene.add_component(id, Box::new(watcher));

    // A queued event keeps the next attach in the transaction queue
    scene.push_event(Event::new("hold", EventTarget::Listeners));
    let mesh = scene.add_component(id, unit_mesh());
    assert!(!mesh.is_attached());

    assert!(scene.set_entity_active(id, true));
    assert!(!mesh.is_active());
    assert!(scene.storage(MeshComponent::TYPE).map_or(true, |storage| storage.read().is_empty()));

    frame(&scene, 1);
    assert!(mesh.is_attached());
    assert!(mesh.is_active());
    assert_eq!(*activations.lock(), vec![None, Some(MeshComponent::TYPE)]);
}

#[test]
fn test_add_component_notifies_existing_components() {
    let scene = scene();
    let id = scene.create_entity("watched", None);
    let watcher = Watcher::default();
    let activations = Arc::clone(&watcher.activations);
    scene.add_component(id, Box::new(watcher));
    scene.add_component(id, unit_mesh());

    assert_eq!(*activations.lock(), vec![None, Some(MeshComponent::TYPE)]);
}

#[test]
fn test_add_component_replaces_same_type() {
    let scene = scene();
    let id = scene.create_entity("crate", None);
    let first = scene.add_component(id, unit_mesh());
    let second = scene.add_component(id, unit_mesh());

    assert!(!first.is_active());
    assert!(second.is_active());
    let current = scene.entity(id).unwrap().component(MeshComponent::TYPE).unwrap();
    assert!(Arc::ptr_eq(&current, &second));
    assert_eq!(scene.storage(MeshComponent::TYPE).unwrap().read().len(), 1);
}

#[test]
fn test_remove_entity_takes_descendants() {
    let scene = scene();
    add_camera(&scene);
    let parent = scene.create_entity("parent", None);
    let child = scene.create_entity("child", Some(parent));
    let grandchild = scene.create_entity("grandchild", Some(child));
    scene.add_component(grandchild, unit_mesh());
    frame(&scene, 1);
    assert_eq!(scene.storage(MeshComponent::TYPE).unwrap().read().cosmos().len(), 1);

    scene.remove_entity(parent);
    assert!(scene.entity(child).is_none());
    assert!(scene.entity(grandchild).is_none());
    assert_eq!(scene.entity_count(), 1);

    frame(&scene, 2);
    let storage = scene.storage(MeshComponent::TYPE).unwrap();
    assert!(storage.read().is_empty());
    assert!(storage.read().cosmos().is_empty());
}

#[test]
fn test_hierarchy_propagates_world_transforms() {
    let scene = scene();
    add_camera(&scene);
    let parent = scene.create_entity("parent", None);
    let child = scene.create_entity("child", Some(parent));
    scene.set_transform(child, Transform::from_position(Vec3::new(0.0, 1.0, 0.0)));
    frame(&scene, 1);

    scene.set_transform(parent, Transform::from_position(Vec3::new(5.0, 0.0, 0.0)));
    frame(&scene, 2);
    let world = scene.entity(child).unwrap().world_matrix();
    assert_relative_eq!(translation_of(&world), Vec3::new(5.0, 1.0, 0.0), epsilon = 1e-5);

    assert!(!scene.set_parent(parent, Some(child)));
    assert!(scene.set_parent(child, None));
    assert!(scene.entity(parent).unwrap().children().is_empty());
}

#[test]
fn test_deactivated_entity_leaves_storage() {
    let scene = scene();
    let (id, mesh) = spawn_box(&scene, "crate", Vec3::zeros());
    assert!(scene.set_entity_active(id, false));
    assert!(!mesh.is_active());
    assert!(scene.storage(MeshComponent::TYPE).unwrap().read().is_empty());

    assert!(scene.set_entity_active(id, true));
    assert!(mesh.is_active());
    assert!(scene.find_entity_by_name("crate").is_some());
}

// ---------------------------------------------------------------------
// Parallel phases
// ---------------------------------------------------------------------

#[test]
fn test_parallel_phases_visit_every_component_once() {
    let scene = scene();
    let animated = Arc::new(AtomicUsize::new(0));
    let synchronized = Arc::new(AtomicUsize::new(0));
    for i in 0..100 {
        let id = scene.create_entity(format!("ticker{}", i), None);
        scene.add_component(
            id,
            Box::new(Ticker {
                animated: Arc::clone(&animated),
                synchronized: Arc::clone(&synchronized),
            }),
        );
    }

    frame(&scene, 1);
    assert_eq!(animated.load(Ordering::SeqCst), 100);
    assert_eq!(synchronized.load(Ordering::SeqCst), 100);
    assert_eq!(scene.stats().dispatched_frames, 1);
}

#[test]
fn test_simulator_steps_once_per_frame() {
    let simulator = Arc::new(Mutex::new(CountingSimulator::default()));
    let scene = SceneGraph::new(SceneDesc::new(settings()).with_simulator(simulator.clone()));

    frame(&scene, 1);
    frame(&scene, 2);
    assert_eq!(simulator.lock().steps, 2);
    assert_relative_eq!(simulator.lock().elapsed, 2.0 / 60.0);
}

#[test]
fn test_loading_material_fades() {
    let scene = scene();
    scene.dispatch(&Clock::fixed(0.0, 0.0, 0));
    assert_relative_eq!(scene.loading_material().surface().diffuse.x, 0.5);
}

// ---------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------

#[test]
fn test_events_reach_components_then_listeners() {
    let scene = scene();
    let id = scene.create_entity("inbox", None);
    let watcher = Watcher::default();
    let messages = Arc::clone(&watcher.messages);
    scene.add_component(id, Box::new(watcher));

    let heard = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&heard);
    let listener = scene.listen("ping", move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    scene.push_event(Event::new("ping", EventTarget::Entity(id)));
    scene.push_event(Event::new("ping", EventTarget::Scene));
    scene.push_event(Event::new("ping", EventTarget::Listeners));
    scene.step_events();

    assert_eq!(messages.load(Ordering::SeqCst), 2);
    assert_eq!(heard.load(Ordering::SeqCst), 3);
    assert_eq!(scene.pending_events(), 0);

    assert!(scene.unlisten(listener));
    scene.push_event(Event::new("ping", EventTarget::Listeners));
    scene.step_events();
    assert_eq!(heard.load(Ordering::SeqCst), 3);
}

#[test]
fn test_component_listener_dropped_with_component() {
    let scene = scene();
    let (_, mesh) = spawn_box(&scene, "crate", Vec3::zeros());
    let heard = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&heard);
    scene.listen_for(&mesh, "ping", move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    scene.remove_component(&mesh);
    scene.push_event(Event::new("ping", EventTarget::Listeners));
    scene.step_events();
    assert_eq!(heard.load(Ordering::SeqCst), 0);
}

#[test]
fn test_entity_events_reach_every_component() {
    let scene = scene();
    let id = scene.create_entity("inbox", None);
    let mailbox = Mailbox::default();
    let received = Arc::clone(&mailbox.received);
    scene.add_component(id, Box::new(mailbox));

    scene.push_event(Event::new("ping", EventTarget::Entity(id)));
    scene.step_events();
    assert_eq!(received.load(Ordering::SeqCst), 1);

    scene.push_event(Event::new("ping", EventTarget::Scene));
    scene.step_events();
    assert_eq!(received.load(Ordering::SeqCst), 1);
}

#[test]
fn test_entity_removal_reports_component_removal() {
    let mut config = settings();
    config.scene.mutations = true;
    let mutating = scene_with(config);
    let removals = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&removals);
    mutating.listen(MUTATION_EVENT, move |_, event| {
        if event.get_text("verb") == Some("removed") {
            seen.lock().push(event.arg("component").is_some());
        }
    });

    let (id, _) = spawn_box(&mutating, "crate", Vec3::zeros());
    frame(&mutating, 1);
    frame(&mutating, 2);
    assert!(mutating.entity(id).unwrap().has_component(MeshComponent::TYPE));

    mutating.remove_entity(id);
    frame(&mutating, 3);
    frame(&mutating, 4);
    assert!(mutating.entity(id).is_none());

    let removals = removals.lock();
    assert_eq!(removals.iter().filter(|&&component| component).count(), 1);
    assert_eq!(removals.iter().filter(|&&component| !component).count(), 1);
}

#[test]
fn test_mutation_events_only_when_enabled() {
    let mut config = settings();
    config.scene.mutations = true;
    let mutating = scene_with(config);
    let verbs = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&verbs);
    mutating.listen(MUTATION_EVENT, move |_, event| {
        seen.lock().push(event.get_text("verb").unwrap_or_default().to_string());
    });

    let id = mutating.create_entity("crate", None);
    mutating.step_events();
    assert_eq!(*verbs.lock(), vec!["created".to_string()]);

    mutating.remove_entity(id);
    mutating.step_events();
    assert_eq!(verbs.lock().last().map(String::as_str), Some("removed"));

    let quiet = scene();
    quiet.create_entity("crate", None);
    assert_eq!(quiet.pending_events(), 0);
}

// ---------------------------------------------------------------------
// Materials and publish
// ---------------------------------------------------------------------

#[test]
fn test_delete_material_compacts_slots() {
    let scene = scene();
    let a = Arc::new(Material::new("a", MaterialSurface::default()));
    let b = Arc::new(Material::new("b", MaterialSurface::default()));
    let c = Arc::new(Material::new("c", MaterialSurface::default()));
    assert_eq!(scene.add_material(&a), 1);
    assert_eq!(scene.add_material(&b), 2);
    assert_eq!(scene.add_material(&c), 3);
    assert_eq!(scene.add_material(&b), 2);

    scene.delete_material(&b);
    assert_eq!(b.slot(), None);
    assert_eq!(c.slot(), Some(2));
    assert!(Arc::ptr_eq(&scene.material_by_slot(2).unwrap(), &c));
    assert!(scene.material_by_name("b").is_none());

    scene.delete_material(&scene.loading_material().clone());
    assert_eq!(scene.materials().len(), 3);
}

#[test]
fn test_publish_without_camera_draws_nothing() {
    let scene = scene();
    spawn_box(&scene, "crate", Vec3::new(0.0, 0.0, -5.0));
    frame(&scene, 1);

    let mut device = HeadlessDevice::new();
    assert_eq!(scene.publish(&mut device, &Clock::default()).unwrap(), 0);
    assert_eq!(device.material_uploads(), 0);
}

#[test]
fn test_publish_batches_visible_meshes() {
    let scene = scene();
    add_camera(&scene);
    for i in 0..3 {
        spawn_box(&scene, &format!("front{}", i), Vec3::new(i as f32 * 2.0 - 2.0, 0.0, -10.0));
    }
    spawn_box(&scene, "behind", Vec3::new(0.0, 0.0, 10.0));
    frame(&scene, 1);

    let mut device = HeadlessDevice::new();
    let draw_calls = scene.publish(&mut device, &Clock::default()).unwrap();
    assert_eq!(draw_calls, 1);
    assert_eq!(scene.stats().draw_calls, 1);

    let draws = device.take_draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].geometry, GeometryId(1));
    assert_eq!(draws[0].material_slot, 0);
    assert_eq!(draws[0].transforms.len(), 3);
    assert_eq!(device.material_buffer().len(), std::mem::size_of::<MaterialData>());
}

#[test]
#[should_panic(expected = "material buffer")]
fn test_failed_material_upload_is_fatal() {
    let scene = scene();
    add_camera(&scene);
    let mut device = HeadlessDevice::new().with_failing_uploads();
    let _ = scene.publish(&mut device, &Clock::default());
}

#[test]
fn test_occluded_mesh_dropped_next_frame() {
    let mut settings = settings();
    settings.render.occlusion_culling = true;
    let scene = scene_with(settings);
    add_camera(&scene);
    spawn_box(&scene, "left", Vec3::new(-3.0, 0.0, -10.0));
    spawn_box(&scene, "right", Vec3::new(3.0, 0.0, -10.0));
    frame(&scene, 1);

    let mut device = HeadlessDevice::new().with_occlusion_oracle(|bounds: &Mat4| translation_of(bounds).x < 0.0);
    scene.publish(&mut device, &Clock::default()).unwrap();
    let first = device.take_draws();
    assert_eq!(first[0].transforms.len(), 2);
    assert_eq!(device.issued_queries(), 2);

    frame(&scene, 2);
    scene.publish(&mut device, &Clock::default()).unwrap();
    let second = device.take_draws();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].transforms.len(), 1);
    assert!(translation_of(&second[0].transforms[0]).x < 0.0);
}

#[test]
fn test_camera_uses_scene_render_settings() {
    let mut settings = settings();
    settings.render.refresh_frames = 5;
    settings.render.instancing = false;
    let scene = scene_with(settings);
    let camera = add_camera(&scene);

    let config = camera.with::<Camera, _>(|camera| camera.render_system().state().config().clone());
    assert_eq!(config.as_ref(), Some(scene.render_config()));
    assert_eq!(config.map(|config| config.refresh_frames), Some(5));
}

#[test]
fn test_culled_lists_reused_between_refreshes() {
    let mut settings = settings();
    settings.render.refresh_frames = 3;
    let scene = scene_with(settings);
    let camera = add_camera(&scene);
    spawn_box(&scene, "left", Vec3::new(-2.0, 0.0, -10.0));
    spawn_box(&scene, "right", Vec3::new(2.0, 0.0, -10.0));
    frame(&scene, 1);

    let mut device = HeadlessDevice::new();
    scene.publish(&mut device, &Clock::default()).unwrap();
    assert_eq!(device.take_draws()[0].transforms.len(), 2);

    spawn_box(&scene, "middle", Vec3::new(0.0, 0.0, -10.0));
    for index in 2..4 {
        frame(&scene, index);
        scene.publish(&mut device, &Clock::default()).unwrap();
        assert_eq!(device.take_draws()[0].transforms.len(), 2, "frame {index} rebuilt early");
    }

    frame(&scene, 4);
    scene.publish(&mut device, &Clock::default()).unwrap();
    assert_eq!(device.take_draws()[0].transforms.len(), 3);
    let cached = camera.with::<Camera, _>(|camera| {
        camera
            .render_system()
            .renderer::<DrawableRenderer>()
            .and_then(|renderer| renderer.culled(MeshComponent::TYPE))
            .map(|lists| lists.len())
    });
    assert_eq!(cached.flatten(), Some(3));
}

#[test]
fn test_subpass_draws_from_its_own_viewer() {
    let mut settings = settings();
    settings.render.occlusion_culling = true;
    let scene = scene_with(settings);
    let camera = add_camera(&scene);
    spawn_box(&scene, "front", Vec3::new(0.0, 0.0, -10.0));
    spawn_box(&scene, "back", Vec3::new(0.0, 0.0, 10.0));
    frame(&scene, 1);

    let mut device = HeadlessDevice::new();
    scene.publish(&mut device, &Clock::default()).unwrap();
    let main = device.take_draws();
    assert_eq!(main[0].transforms.len(), 1);
    assert!(translation_of(&main[0].transforms[0]).z < 0.0);
    assert_eq!(device.issued_queries(), 1);

    let mut behind = Viewer::perspective(std::f32::consts::FRAC_PI_3, 1.0, 0.1, 1000.0);
    behind.look_at(Vec3::zeros(), Vec3::new(0.0, 0.0, 10.0), Vec3::y());
    let camera_viewer = camera.with::<Camera, _>(|camera| camera.viewer().clone()).unwrap();

    let draw_calls = camera
        .with_mut::<Camera, _>(|camera| {
            camera
                .render_system_mut()
                .render_subpass(&scene, &mut device, &Clock::default(), behind)
        })
        .unwrap()
        .unwrap();
    assert_eq!(draw_calls, 1);
    let sub = device.take_draws();
    assert_eq!(sub[0].transforms.len(), 1);
    assert!(translation_of(&sub[0].transforms[0]).z > 0.0);

    camera.with::<Camera, _>(|camera| {
        let render_system = camera.render_system();
        assert_eq!(render_system.viewer(), &camera_viewer);
        assert!(!render_system.state().is_nested());
        assert_eq!(render_system.state().occlusion().pending_requests(), 0);
        let cached = render_system
            .renderer::<DrawableRenderer>()
            .and_then(|renderer| renderer.culled(MeshComponent::TYPE))
            .map(|lists| lists.len());
        assert_eq!(cached, Some(1));
    });
    assert_eq!(device.issued_queries(), 1);
}

// ---------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------

#[test]
fn test_snapshot_round_trip() {
    let rock = Arc::new(Material::new("rock", MaterialSurface::default()).with_path("rock.mat"));
    let mut content = MemoryContent::new();
    content.insert("rock.mat", Arc::clone(&rock));

    let source = scene();
    source.add_material(&rock);
    let root = source.create_entity("root", None);
    let arm = source.create_entity("arm", Some(root));
    source.set_transform(arm, Transform::from_position(Vec3::new(1.0, 2.0, 3.0)));
    source.add_component(
        arm,
        Box::new(MeshComponent::new(GeometryId(7), Some(Arc::clone(&rock)), None)),
    );

    let text = source.capture_snapshot().to_ron().unwrap();
    let snapshot = SceneSnapshot::from_ron(&text).unwrap();
    assert_eq!(snapshot.entities.len(), 2);
    assert_eq!(snapshot.entities[1].parent, Some(0));

    let mut registry = ComponentRegistry::new();
    registry.register::<MeshComponent>();
    let target = scene();
    let map = target.restore_snapshot(&snapshot, &registry, &content).unwrap();
    assert_eq!(map.len(), 2);

    let restored_root = target.find_entity_by_name("root").unwrap();
    let restored_arm = target.find_entity_by_name("arm").unwrap();
    assert_eq!(restored_arm.parent(), Some(restored_root.id()));
    assert_eq!(map.index_of(restored_arm.id()), Some(1));
    assert_eq!(restored_arm.transform(), Transform::from_position(Vec3::new(1.0, 2.0, 3.0)));

    let mesh = restored_arm.component(MeshComponent::TYPE).unwrap();
    assert!(mesh.is_active());
    let material = mesh.with::<MeshComponent, _>(|mesh| mesh.material.clone()).flatten().unwrap();
    assert!(Arc::ptr_eq(&material, &rock));
    assert!(target.material_by_name("rock").is_some());
}

#[test]
fn test_restore_rejects_forward_parent() {
    let snapshot = SceneSnapshot {
        entities: vec![EntityRecord {
            name: "orphan".to_string(),
            active: true,
            transform: Transform::identity(),
            parent: Some(1),
            components: Vec::new(),
        }],
        materials: Vec::new(),
    };

    let scene = scene();
    let result = scene.restore_snapshot(&snapshot, &ComponentRegistry::new(), &MemoryContent::new());
    assert!(matches!(result, Err(SnapshotError::InvalidParent { entity: 0, parent: 1 })));
    assert_eq!(scene.entity_count(), 0);
}

#[test]
fn test_restore_rejects_unknown_component() {
    let source = scene();
    let id = source.create_entity("crate", None);
    source.add_component(id, Box::new(Marker));

    let snapshot = source.capture_snapshot();
    let result = scene().restore_snapshot(&snapshot, &ComponentRegistry::new(), &MemoryContent::new());
    assert!(matches!(result, Err(SnapshotError::UnknownComponent(type_id)) if type_id == Marker::TYPE));
}
