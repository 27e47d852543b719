// Copyright (c) 2024 The Gimbal developers
// SPDX-License-Identifier: MIT
// Licensed under the MIT License;
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://spdx.org/licenses/MIT
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Instantiates the dependency graph declared by unit manifests.
//!
//! Starting from the root units, every required capability is resolved
//! through the registry and instantiated exactly once per concrete type.
//! The output is a topological order (dependencies first, ties broken by
//! declaration order) with every unit already wired.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::Arc,
};

use crate::{
    registry::{Iface, Registry, Slots},
    Error, Unit,
};

/// A unit in its resolved position: dependencies precede dependents.
pub struct ResolvedUnit {
    pub name: String,
    pub unit: Arc<dyn Unit>,
}

impl std::fmt::Debug for ResolvedUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedUnit").field("name", &self.name).finish_non_exhaustive()
    }
}

struct Walk<'a> {
    registry: &'a Registry,
    // Concrete type -> fully resolved. Entries are added only after the
    // type's whole subtree has been visited.
    instantiated: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    slots: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    order: Vec<ResolvedUnit>,
    path: Vec<Iface>,
}

impl Walk<'_> {
    fn visit(&mut self, iface: Iface) -> Result<(), Error> {
        let binding = self.registry.lookup(&iface)?;
        let concrete = binding.concrete();

        if let Some(any) = self.instantiated.get(&concrete.id()) {
            // Same concrete reached through a second interface; expose the
            // existing instance under this interface as well.
            if !self.slots.contains_key(&iface.id()) {
                let slot = binding.cast_iface(&**any).ok_or_else(|| {
                    Error::internal("resolver", format!("cast failed for {iface}"))
                })?;
                self.slots.insert(iface.id(), slot);
            }
            return Ok(());
        }

        if self.path.iter().any(|step| step.id() == concrete.id()) {
            let cycle = self
                .path
                .iter()
                .map(|step| step.name())
                .chain(std::iter::once(concrete.name()))
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(Error::internal(
                "resolver",
                format!("dependency cycle: {cycle}"),
            ));
        }

        self.path.push(concrete);
        let instance = binding.construct();
        let manifest = instance.unit().manifest();
        for dep in manifest.deps() {
            self.visit(*dep)?;
        }
        self.path.pop();

        let (resolved_unit, any) = instance.into_parts();
        let concrete_slot = binding.cast_concrete(&*any).ok_or_else(|| {
            Error::internal("resolver", format!("cast failed for {concrete}"))
        })?;
        let iface_slot = binding
            .cast_iface(&*any)
            .ok_or_else(|| Error::internal("resolver", format!("cast failed for {iface}")))?;
        self.slots.insert(concrete.id(), concrete_slot);
        self.slots.insert(iface.id(), iface_slot);
        self.instantiated.insert(concrete.id(), any);
        self.order.push(ResolvedUnit {
            name: manifest.name().to_owned(),
            unit: resolved_unit,
        });
        Ok(())
    }
}

/// Resolve and wire the graph reachable from the given root units.
///
/// Roots are ordered after their dependencies, in the order given. Every
/// unit's [Unit::wire] has been called by the time this returns.
pub fn resolve(
    registry: &Registry,
    roots: Vec<Arc<dyn Unit>>,
) -> Result<Vec<ResolvedUnit>, Error> {
    let mut walk = Walk {
        registry,
        instantiated: HashMap::new(),
        slots: HashMap::new(),
        order: Vec::new(),
        path: Vec::new(),
    };

    for root in roots {
        let manifest = root.manifest();
        for dep in manifest.deps() {
            walk.visit(*dep)?;
        }
        walk.order.push(ResolvedUnit {
            name: manifest.name().to_owned(),
            unit: root,
        });
    }

    let slots = Slots::new(&walk.slots);
    for resolved in &walk.order {
        resolved.unit.wire(&slots)?;
    }

    Ok(walk.order)
}

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;

    use super::*;
    use crate::{bind_unit, registry::Manifest};

    trait Clock: Send + Sync {
        fn now(&self) -> u64;
    }

    trait Store: Send + Sync {
        fn clock_addr(&self) -> usize;
    }

    #[derive(Default)]
    struct FakeClock;

    impl Clock for FakeClock {
        fn now(&self) -> u64 {
            42
        }
    }

    impl Unit for FakeClock {
        fn manifest(&self) -> Manifest {
            Manifest::new("clock")
        }
    }

    #[derive(Default)]
    struct MemStore {
        clock: OnceLock<Arc<dyn Clock>>,
    }

    impl Store for MemStore {
        fn clock_addr(&self) -> usize {
            self.clock.get().map_or(0, |c| Arc::as_ptr(c) as *const () as usize)
        }
    }

    impl Unit for MemStore {
        fn manifest(&self) -> Manifest {
            Manifest::new("store").requires::<dyn Clock>()
        }

        fn wire(&self, slots: &Slots) -> Result<(), Error> {
            let clock = slots.get::<dyn Clock>()?;
            assert!(self.clock.set(clock).is_ok());
            Ok(())
        }
    }

    struct App {
        store: OnceLock<Arc<dyn Store>>,
        clock: OnceLock<Arc<dyn Clock>>,
    }

    impl App {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                store: OnceLock::new(),
                clock: OnceLock::new(),
            })
        }
    }

    impl Unit for App {
        fn manifest(&self) -> Manifest {
            Manifest::new("app").requires::<dyn Store>().requires::<dyn Clock>()
        }

        fn wire(&self, slots: &Slots) -> Result<(), Error> {
            assert!(self.store.set(slots.get::<dyn Store>()?).is_ok());
            assert!(self.clock.set(slots.get::<dyn Clock>()?).is_ok());
            Ok(())
        }
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        bind_unit!(registry, dyn Clock, FakeClock).unwrap();
        bind_unit!(registry, dyn Store, MemStore).unwrap();
        registry
    }

    #[test]
    fn dependencies_precede_dependents() {
        let registry = registry();
        let order = resolve(&registry, vec![App::new()]).unwrap();
        let names: Vec<_> = order.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["clock", "store", "app"]);
    }

    #[test]
    fn singleton_per_type() {
        let registry = registry();
        let app = App::new();
        let _order = resolve(&registry, vec![app.clone() as Arc<dyn Unit>]).unwrap();

        // The clock reached directly and the clock reached through the
        // store must be the same instance.
        let direct = app.clock.get().unwrap();
        let via_store = app.store.get().unwrap().clock_addr();
        assert_eq!(Arc::as_ptr(direct) as *const () as usize, via_store);
        assert_eq!(direct.now(), 42);
    }

    #[derive(Default)]
    struct Tuner {
        clock: OnceLock<Arc<FakeClock>>,
    }

    impl Unit for Tuner {
        fn manifest(&self) -> Manifest {
            Manifest::new("tuner").requires::<FakeClock>()
        }

        fn wire(&self, slots: &Slots) -> Result<(), Error> {
            assert!(self.clock.set(slots.get::<FakeClock>()?).is_ok());
            Ok(())
        }
    }

    #[test]
    fn concrete_slot_resolves_through_an_interface_binding() {
        // Only the interface binding exists; the concrete-typed slot must
        // still resolve, to the same singleton.
        let registry = registry();
        let tuner = Arc::new(Tuner::default());
        let app = App::new();
        let roots = vec![tuner.clone() as Arc<dyn Unit>, app.clone() as Arc<dyn Unit>];
        let _order = resolve(&registry, roots).unwrap();

        let direct = tuner.clock.get().unwrap();
        assert_eq!(direct.now(), 42);
        let via_iface = app.clock.get().unwrap();
        assert_eq!(
            Arc::as_ptr(direct) as *const (),
            Arc::as_ptr(via_iface) as *const (),
        );
    }

    #[test]
    fn missing_binding_fails() {
        let registry = Registry::new();
        let err = resolve(&registry, vec![App::new()]).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[derive(Default)]
    struct Chicken;

    #[derive(Default)]
    struct Egg;

    impl Unit for Chicken {
        fn manifest(&self) -> Manifest {
            Manifest::new("chicken").requires::<Egg>()
        }
    }

    impl Unit for Egg {
        fn manifest(&self) -> Manifest {
            Manifest::new("egg").requires::<Chicken>()
        }
    }

    #[test]
    fn cycle_is_detected() {
        let mut registry = Registry::new();
        bind_unit!(registry, Chicken).unwrap();
        bind_unit!(registry, Egg).unwrap();

        let root: Arc<dyn Unit> = Arc::new(Chicken);
        let err = resolve(&registry, vec![root]).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("cycle"), "unexpected error: {message}");
    }
}
