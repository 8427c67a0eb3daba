//! Predator/prey ecosystem built on causal stores.
//!
//! `prey` is the only store written directly. Its laws keep the population
//! within the land's carrying capacity, and their reactions drive `grass`
//! and `predators`. An emergence detector samples all three every season.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use causa_analysis::{EmergenceConfig, EmergenceDetector};
use causa_core::{ManualClock, StoreHandle, StoreOptions, StoreRegistry};
use causa_laws::{define_law, FnConstraint, GovernedWrite, LawOptions, LawRegistry, Substrate};

/// Most prey the land can feed.
pub const CARRYING_CAPACITY: i64 = 500;

/// Grass when no prey is grazing.
pub const MAX_GRASS: i64 = 300;

/// Prey counts reported season after season.
pub const PREY_CYCLE: [i64; 6] = [120, 260, 410, 560, 300, 150];

/// First season, Unix milliseconds.
pub const EPOCH_MS: u64 = 1_706_720_000_000;

/// One season of recorded time.
pub const SEASON_MS: u64 = 1_000;

fn population(value: &Value) -> i64 {
    value.as_i64().unwrap_or(0)
}

/// Predators a prey population can sustain.
pub fn predators_for(prey: i64) -> i64 {
    prey / 8 + 2
}

/// Grass left after `prey` has grazed.
pub fn grass_for(prey: i64) -> i64 {
    (MAX_GRASS - prey / 2).max(0)
}

/// Laws bound to `prey`.
pub fn ecosystem_laws() -> LawRegistry<Value> {
    let bounds = Substrate::new("prey-bounds")
        .with(
            FnConstraint::predicate("prey cannot be negative", |v: &Value| population(v) >= 0)
                .with_repair(|_| json!(0)),
        )
        .with(
            FnConstraint::predicate("prey exceeds carrying capacity", |v: &Value| {
                population(v) <= CARRYING_CAPACITY
            })
            .with_repair(|_| json!(CARRYING_CAPACITY)),
        );

    let laws = LawRegistry::new();
    laws.register(
        "prey",
        define_law(
            "carrying-capacity",
            bounds,
            LawOptions::new()
                .reaction("predators", |prey: Value| async move {
                    Ok(json!(predators_for(population(&prey))))
                })
                .reaction("grass", |prey: Value| async move {
                    Ok(json!(grass_for(population(&prey))))
                }),
        ),
    );
    laws
}

/// Populations at one moment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Census {
    pub grass: Value,
    pub prey: Value,
    pub predators: Value,
}

/// Stores, laws and detector of one simulation run.
pub struct Ecosystem {
    pub stores: StoreRegistry<Value>,
    pub laws: LawRegistry<Value>,
    pub detector: EmergenceDetector,
    pub clock: ManualClock,
}

impl Ecosystem {
    pub fn new(config: EmergenceConfig) -> causa_analysis::Result<Self> {
        let clock = ManualClock::new(EPOCH_MS);
        let stores = StoreRegistry::with_options(StoreOptions::with_clock(Arc::new(clock.clone())));
        let detector = EmergenceDetector::with_clock(config, Arc::new(clock.clone()))?;

        for (key, initial) in [
            ("grass", json!(MAX_GRASS)),
            ("prey", json!(100)),
            ("predators", json!(10)),
        ] {
            let handle = stores.create_store(key, initial)?;
            detector.observe_store(&*handle.lock())?;
        }

        Ok(Self {
            stores,
            laws: ecosystem_laws(),
            detector,
            clock,
        })
    }

    pub fn store(&self, key: &str) -> causa_core::Result<StoreHandle<Value>> {
        self.stores.require(key)
    }

    /// Reports `prey` for the next season, lets the laws respond and
    /// samples the result.
    pub async fn season(&self, prey: i64) -> causa_core::Result<GovernedWrite<Value>> {
        let handle = self.store("prey")?;
        self.clock.advance(SEASON_MS);
        let write = self.laws.govern_set(&handle, json!(prey), Some(&self.stores)).await;
        self.detector.tick();
        Ok(write)
    }

    pub fn census(&self) -> causa_core::Result<Census> {
        Ok(Census {
            grass: self.store("grass")?.lock().get(),
            prey: self.store("prey")?.lock().get(),
            predators: self.store("predators")?.lock().get(),
        })
    }
}
