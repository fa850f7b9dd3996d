use std::rc::Rc;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::{FeedConfig, FeedKind, SeenPolicy};
use crate::fomo::codec::ObfuscationCodec;
use crate::fomo::gender::{GenderClassifier, GenderResolver};
use crate::fomo::identity::{
    normalize, Bans, Identity, IdentityPool, FIRST_NAME_GENDERS, NAME_GENDER_OVERRIDES,
};
use crate::fomo::payload::{pick_package, pick_quote};
use crate::fomo::queue::{event_id, DisplayEvent, DisplayQueue, Payload};
use crate::fomo::scheduler::{Clock, PageEnvironment, Scheduler, TimerDriver, TimerToken};
use crate::fomo::seen::{merge_max, RecentHistory, SeenMap, SeenTracker};
use crate::fomo::store::{KeyValueMedium, ObfuscatedStore};
use crate::fomo::sync::{BroadcastMedium, CrossTabSync, SyncHandler, SyncMessage};

/// Everything the engine needs from its host.
pub struct Capabilities {
    pub medium: Rc<dyn KeyValueMedium>,
    pub codec: Rc<ObfuscationCodec>,
    pub broadcast: Box<dyn BroadcastMedium>,
    pub clock: Rc<dyn Clock>,
    pub environment: Rc<dyn PageEnvironment>,
    pub timers: Box<dyn TimerDriver>,
    pub rng_seed: Option<u64>,
}

/// One feed of synthetic notifications: purchase toasts or testimonials.
///
/// The engine is driven from outside. The host calls `hydrate` once after
/// first render, forwards fired timers to `on_timer`, remote messages to
/// `apply_remote` and page state changes to `on_visibility_change` /
/// `set_in_view`, then calls `dispose` on unmount.
pub struct NotificationEngine {
    config: FeedConfig,
    store: ObfuscatedStore,
    sync: CrossTabSync,
    clock: Rc<dyn Clock>,
    environment: Rc<dyn PageEnvironment>,
    timers: Box<dyn TimerDriver>,
    rng: SmallRng,
    pool: IdentityPool,
    genders: GenderResolver,
    names: SeenTracker,
    avatars: SeenTracker,
    seen_names: SeenMap,
    seen_avatars: SeenMap,
    recent_names: RecentHistory,
    recent_avatars: RecentHistory,
    queue: DisplayQueue,
    scheduler: Scheduler,
    in_view: bool,
    ready: bool,
    disposed: bool,
    seq: u64,
}

impl NotificationEngine {
    pub fn new(config: FeedConfig, caps: Capabilities) -> Self {
        let store = ObfuscatedStore::new(caps.medium, caps.codec.clone());
        let genders = GenderResolver::new(
            GenderClassifier::new(NAME_GENDER_OVERRIDES, FIRST_NAME_GENDERS),
            store.clone(),
            config.gender_cache_key,
        );
        let rng = match caps.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        Self {
            store,
            sync: CrossTabSync::new(caps.broadcast, caps.codec),
            clock: caps.clock,
            environment: caps.environment,
            timers: caps.timers,
            rng,
            pool: IdentityPool::new(config.pool),
            genders,
            names: SeenTracker::new(&config.names),
            avatars: SeenTracker::new(&config.avatars),
            seen_names: SeenMap::new(),
            seen_avatars: SeenMap::new(),
            recent_names: RecentHistory::new(config.recent_names),
            recent_avatars: RecentHistory::new(config.recent_avatars),
            queue: DisplayQueue::new(config.max_visible),
            scheduler: Scheduler::new(config.schedule.clone()),
            in_view: true,
            ready: false,
            disposed: false,
            seq: 0,
            config,
        }
    }

    /// Loads persisted state, starts listening to other tabs and starts the
    /// scheduler. Nothing is generated before this runs.
    pub fn hydrate(&mut self, on_remote: SyncHandler) {
        if self.ready || self.disposed {
            return;
        }
        let now = self.clock.now_ms();
        self.seen_names = self.names.load(&self.store, now);
        self.seen_avatars = self.avatars.load(&self.store, now);
        self.genders.hydrate();
        self.sync.on_remote_update(on_remote);
        self.ready = true;
        log::info!(
            "{:?} feed hydrated with {} seen names, {} seen avatars",
            self.config.kind,
            self.seen_names.len(),
            self.seen_avatars.len()
        );

        if self.config.seed_on_hydrate {
            self.seed(now);
        }
        let active = self.is_active();
        let device = self.environment.device_class();
        self.scheduler
            .start(active, device, self.timers.as_mut(), &mut self.rng);
    }

    pub fn visible(&self) -> impl Iterator<Item = &DisplayEvent> {
        self.queue.iter()
    }

    pub fn seen_names(&self) -> &SeenMap {
        &self.seen_names
    }

    pub fn seen_avatars(&self) -> &SeenMap {
        &self.seen_avatars
    }

    pub fn on_timer(&mut self, token: TimerToken) {
        if self.disposed {
            return;
        }
        self.timers.cancel(&token);
        match token {
            TimerToken::Tick(generation) => {
                if !self.scheduler.on_tick(generation) {
                    return;
                }
                if self.is_active() {
                    self.fire();
                }
                let active = self.is_active();
                let device = self.environment.device_class();
                self.scheduler
                    .after_fire(active, device, self.timers.as_mut(), &mut self.rng);
            }
            TimerToken::Expire(id) => {
                self.dismiss(&id);
            }
        }
    }

    pub fn on_visibility_change(&mut self) {
        self.refresh_activity();
    }

    /// Whether the widget is scrolled into view. Only testimonials track
    /// this; toasts are always "in view".
    pub fn set_in_view(&mut self, in_view: bool) {
        if self.in_view != in_view {
            self.in_view = in_view;
            self.refresh_activity();
        }
    }

    fn is_active(&self) -> bool {
        self.environment.is_visible() && self.in_view
    }

    fn refresh_activity(&mut self) {
        if !self.ready || self.disposed {
            return;
        }
        let active = self.is_active();
        let device = self.environment.device_class();
        self.scheduler
            .set_active(active, device, self.timers.as_mut(), &mut self.rng);
    }

    /// Generates one event now. Returns its id, or `None` when the pool is
    /// exhausted under the current bans.
    pub fn fire(&mut self) -> Option<String> {
        if !self.ready || self.disposed {
            return None;
        }
        let now = self.clock.now_ms();
        self.names.prune(&mut self.seen_names, now);
        self.avatars.prune(&mut self.seen_avatars, now);

        let Some(identity) = self.propose() else {
            log::debug!("{:?} pool exhausted, skipping tick", self.config.kind);
            return None;
        };
        let event = self.build_event(identity, now);
        let id = event.id.clone();
        self.record(&event, now);
        self.commit(now);
        self.show(event);
        Some(id)
    }

    fn bans(&self) -> Bans {
        let mut bans = Bans::default();
        for event in self.queue.iter() {
            bans.names.insert(normalize(&event.name));
            bans.avatars.insert(normalize(&event.avatar_url));
        }
        self.recent_names.extend_bans(&mut bans.names);
        self.recent_avatars.extend_bans(&mut bans.avatars);
        match self.config.seen_policy {
            SeenPolicy::Ban => {
                bans.names.extend(self.seen_names.keys().cloned());
                bans.avatars.extend(self.seen_avatars.keys().cloned());
            }
            SeenPolicy::Steer => {
                bans.steer.extend(self.seen_names.keys().cloned());
            }
        }
        bans
    }

    fn propose(&mut self) -> Option<Identity> {
        let bans = self.bans();
        self.pool
            .propose(&mut self.genders, &bans, self.config.attempts, &mut self.rng)
    }

    fn build_event(&mut self, identity: Identity, now: i64) -> DisplayEvent {
        self.seq += 1;
        let id = event_id(self.config.id_prefix, now, self.seq, &mut self.rng);
        let payload = match self.config.kind {
            FeedKind::Purchases => Payload::Purchase {
                package: pick_package(&mut self.rng),
            },
            FeedKind::Testimonials => Payload::Testimonial {
                quote: pick_quote(&mut self.rng),
                rating: 5,
            },
        };
        let created_at = match self.config.backdate_secs {
            Some((lo, hi)) => now - i64::from(self.rng.gen_range(lo..=hi)) * 1000,
            None => now,
        };
        DisplayEvent {
            id,
            name: identity.name,
            avatar_url: identity.avatar_url,
            created_at,
            payload,
        }
    }

    fn record(&mut self, event: &DisplayEvent, now: i64) {
        let name_key = normalize(&event.name);
        let avatar_key = normalize(&event.avatar_url);
        SeenTracker::add(&mut self.seen_names, &name_key, now);
        SeenTracker::add(&mut self.seen_avatars, &avatar_key, now);
        self.recent_names.push(name_key);
        self.recent_avatars.push(avatar_key);
    }

    /// Merges both seen-sets into storage, adopts the result and tells the
    /// other tabs.
    fn commit(&mut self, now: i64) {
        self.seen_names = self.names.persist(&self.store, &self.seen_names, now);
        self.seen_avatars = self.avatars.persist(&self.store, &self.seen_avatars, now);
        self.sync
            .broadcast(Some(&self.seen_names), Some(&self.seen_avatars));
    }

    fn show(&mut self, event: DisplayEvent) {
        let id = event.id.clone();
        log::debug!("Showing {} ({})", event.name, id);
        for old in self.queue.push(event) {
            self.timers.cancel(&TimerToken::Expire(old.id));
        }
        if let Some(delay) = self.config.auto_dismiss_ms {
            self.timers.arm(TimerToken::Expire(id), delay);
        }
    }

    /// Fills the grid at hydration. Falls back to fixed cards when the pool
    /// yields nothing so the section is never empty.
    fn seed(&mut self, now: i64) {
        let mut seeded = Vec::new();
        while seeded.len() < self.config.max_visible {
            let Some(identity) = self.propose() else {
                break;
            };
            let event = self.build_event(identity, now);
            self.record(&event, now);
            self.show(event.clone());
            seeded.push(event);
        }

        if seeded.is_empty() {
            log::info!("Seeding {:?} feed with fallback cards", self.config.kind);
            let surnames = self.pool.names().last;
            for surname in surnames.iter().take(self.config.max_visible) {
                let name = format!("Alex {}", surname);
                let avatar_url = self
                    .genders
                    .avatar_for(&name, self.pool.names().portrait_slots);
                let event = self.build_event(Identity { name, avatar_url }, now);
                self.record(&event, now);
                self.show(event);
            }
        }
        self.commit(now);
    }

    /// Merges another tab's seen-sets. Nothing is written back; this tab
    /// persists the merged state on its next firing.
    pub fn apply_remote(&mut self, message: SyncMessage) {
        if !self.ready || self.disposed {
            return;
        }
        let now = self.clock.now_ms();
        let update = self.sync.decode(&message, now);
        if update.is_empty() {
            log::debug!("Ignoring undecodable sync message");
            return;
        }
        if let Some(names) = update.names {
            merge_max(&mut self.seen_names, &names);
            self.names.prune(&mut self.seen_names, now);
        }
        if let Some(avatars) = update.avatars {
            merge_max(&mut self.seen_avatars, &avatars);
            self.avatars.prune(&mut self.seen_avatars, now);
        }
    }

    /// Removes an event early. Seen-sets are untouched.
    pub fn dismiss(&mut self, id: &str) -> bool {
        self.timers.cancel(&TimerToken::Expire(id.to_string()));
        self.queue.remove(id).is_some()
    }

    /// Next portrait for `name` after an image load error.
    pub fn alternate_avatar(&mut self, name: &str, attempt: u32) -> String {
        self.pool.alternate_avatar(&mut self.genders, name, attempt)
    }

    /// Cancels every timer and closes the broadcast channel. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.scheduler.stop(self.timers.as_mut());
        for event in self.queue.clear() {
            self.timers.cancel(&TimerToken::Expire(event.id));
        }
        self.sync.close();
        self.disposed = true;
        log::debug!("{:?} feed disposed", self.config.kind);
    }
}
