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

//! Maps capability interfaces to concrete unit types and service names to
//! client stub constructors.
//!
//! Bindings are created with the [crate::bind_unit] macro, which writes
//! the `Arc<Concrete> -> Arc<dyn Iface>` coercion at the registration
//! site; run-time reflection is not needed anywhere else. The registry is
//! populated before the resolver runs and is read-only afterwards.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::Arc,
};

use crate::{Error, Unit};

/// A capability key: a trait object type such as `dyn Broker`, or a
/// concrete unit type for units depended on directly.
#[derive(Clone, Copy, Debug)]
pub struct Iface {
    id: TypeId,
    name: &'static str,
}

impl Iface {
    pub fn of<I: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<I>(),
            name: std::any::type_name::<I>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for Iface {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Iface {}

impl std::fmt::Display for Iface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// A unit's name plus its ordered capability requirements. The order of
/// [Manifest::requires] calls is the resolver's tie-break order.
#[derive(Clone, Debug)]
pub struct Manifest {
    name: &'static str,
    requires: Vec<Iface>,
}

impl Manifest {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            requires: Vec::new(),
        }
    }

    pub fn requires<I: ?Sized + 'static>(mut self) -> Self {
        self.requires.push(Iface::of::<I>());
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn deps(&self) -> &[Iface] {
        &self.requires
    }
}

/// A freshly constructed singleton: the lifecycle view plus a type-erased
/// `Arc<Concrete>` the binding's cast functions know how to reopen.
pub struct Instance {
    unit: Arc<dyn Unit>,
    any: Box<dyn Any + Send + Sync>,
}

impl Instance {
    pub fn new(unit: Arc<dyn Unit>, any: Box<dyn Any + Send + Sync>) -> Self {
        Self { unit, any }
    }

    pub fn unit(&self) -> &Arc<dyn Unit> {
        &self.unit
    }

    pub(crate) fn into_parts(self) -> (Arc<dyn Unit>, Box<dyn Any + Send + Sync>) {
        (self.unit, self.any)
    }
}

type ConstructFn = fn() -> Instance;
type CastFn = fn(&(dyn Any + Send + Sync)) -> Option<Box<dyn Any + Send + Sync>>;

/// An `(interface, concrete)` unit binding. Create via [crate::bind_unit].
#[derive(Debug)]
pub struct Binding {
    iface: Iface,
    concrete: Iface,
    construct: ConstructFn,
    cast_iface: CastFn,
    cast_concrete: CastFn,
}

impl Binding {
    pub fn new(
        iface: Iface,
        concrete: Iface,
        construct: ConstructFn,
        cast_iface: CastFn,
        cast_concrete: CastFn,
    ) -> Self {
        Self {
            iface,
            concrete,
            construct,
            cast_iface,
            cast_concrete,
        }
    }

    pub fn iface(&self) -> Iface {
        self.iface
    }

    pub fn concrete(&self) -> Iface {
        self.concrete
    }

    pub(crate) fn construct(&self) -> Instance {
        (self.construct)()
    }

    pub(crate) fn cast_iface(&self, any: &(dyn Any + Send + Sync)) -> Option<Box<dyn Any + Send + Sync>> {
        (self.cast_iface)(any)
    }

    pub(crate) fn cast_concrete(
        &self,
        any: &(dyn Any + Send + Sync),
    ) -> Option<Box<dyn Any + Send + Sync>> {
        (self.cast_concrete)(any)
    }

    /// The same binding keyed by its concrete type, so slots declared
    /// with the concrete unit type resolve without a separate
    /// registration.
    fn self_binding(&self) -> Binding {
        Binding {
            iface: self.concrete,
            concrete: self.concrete,
            construct: self.construct,
            cast_iface: self.cast_concrete,
            cast_concrete: self.cast_concrete,
        }
    }
}

/// Builds a client stub over a type-erased connection handle. The handle
/// type is owned by the RPC layer; the registry only stores the mapping.
pub type StubCtor = fn(&(dyn Any + Send + Sync)) -> Box<dyn Any + Send + Sync>;

/// The process-wide binding table. Populated at startup, frozen once the
/// resolver takes over.
#[derive(Default)]
pub struct Registry {
    units: HashMap<TypeId, Binding>,
    stubs: HashMap<&'static str, StubCtor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an interface → concrete binding. The concrete type is also
    /// bound to itself, so slots declared with the concrete type need no
    /// extra registration. Re-registering the exact same tuple is a
    /// no-op; a conflicting tuple is a fatal error.
    pub fn bind_unit(&mut self, binding: Binding) -> Result<(), Error> {
        let self_binding =
            (binding.iface != binding.concrete).then(|| binding.self_binding());
        self.insert(binding)?;
        if let Some(self_binding) = self_binding {
            self.insert(self_binding)?;
        }
        Ok(())
    }

    fn insert(&mut self, binding: Binding) -> Result<(), Error> {
        match self.units.get(&binding.iface.id()) {
            None => {
                self.units.insert(binding.iface.id(), binding);
                Ok(())
            }
            Some(existing) if existing.concrete == binding.concrete => Ok(()),
            Some(existing) => Err(Error::DuplicateEntry(format!(
                "interface {} is already bound to {}, cannot bind {}",
                binding.iface, existing.concrete, binding.concrete,
            ))),
        }
    }

    /// Record a service name → stub constructor binding.
    pub fn bind_service_stub(&mut self, name: &'static str, ctor: StubCtor) -> Result<(), Error> {
        match self.stubs.get(name) {
            None => {
                self.stubs.insert(name, ctor);
                Ok(())
            }
            Some(existing) if *existing == ctor => Ok(()),
            Some(_) => Err(Error::DuplicateEntry(format!(
                "service stub {name:?} is already bound"
            ))),
        }
    }

    pub fn lookup(&self, iface: &Iface) -> Result<&Binding, Error> {
        self.units
            .get(&iface.id())
            .ok_or_else(|| Error::NotFound(format!("no binding for interface {iface}")))
    }

    /// Construct a stub for the named service over the given connection
    /// handle, or `None` if the service name is unknown.
    pub fn stub(
        &self,
        name: &str,
        conn: &(dyn Any + Send + Sync),
    ) -> Option<Box<dyn Any + Send + Sync>> {
        self.stubs.get(name).map(|ctor| ctor(conn))
    }

    pub fn stub_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.stubs.keys().copied()
    }
}

/// Read-only view of the resolved capability instances, used by
/// [crate::Unit::wire] to fetch dependency handles.
pub struct Slots<'a> {
    map: &'a HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl<'a> Slots<'a> {
    pub(crate) fn new(map: &'a HashMap<TypeId, Box<dyn Any + Send + Sync>>) -> Self {
        Self { map }
    }

    /// The shared instance for the given capability. Every slot of the
    /// same interface type across the graph receives the same instance.
    pub fn get<I: ?Sized + 'static>(&self) -> Result<Arc<I>, Error> {
        let iface = Iface::of::<I>();
        let slot = self
            .map
            .get(&iface.id())
            .ok_or_else(|| Error::NotFound(format!("no resolved instance for {iface}")))?;
        slot.downcast_ref::<Arc<I>>()
            .cloned()
            .ok_or_else(|| Error::internal("registry", format!("slot type mismatch for {iface}")))
    }
}

/// Register a unit binding: `bind_unit!(registry, dyn Broker, Bus)` binds
/// the interface to the concrete type, `bind_unit!(registry, Bus)` makes a
/// concrete type resolvable directly. The concrete type must implement
/// [Default]; real resource acquisition belongs in `construct`.
#[macro_export]
macro_rules! bind_unit {
    ($registry:expr, $concrete:ty) => {
        $crate::bind_unit!($registry, $concrete, $concrete, |unit| ::std::boxed::Box::new(
            ::std::sync::Arc::clone(unit)
        ))
    };
    ($registry:expr, $iface:ty, $concrete:ty) => {
        $crate::bind_unit!($registry, $iface, $concrete, |unit| ::std::boxed::Box::new(
            ::std::sync::Arc::clone(unit) as ::std::sync::Arc<$iface>
        ))
    };
    ($registry:expr, $iface:ty, $concrete:ty, $coerce:expr) => {
        $registry.bind_unit($crate::registry::Binding::new(
            $crate::registry::Iface::of::<$iface>(),
            $crate::registry::Iface::of::<$concrete>(),
            || {
                let unit = ::std::sync::Arc::new(<$concrete as ::core::default::Default>::default());
                $crate::registry::Instance::new(
                    ::std::sync::Arc::clone(&unit) as ::std::sync::Arc<dyn $crate::Unit>,
                    ::std::boxed::Box::new(unit),
                )
            },
            |any| {
                let unit = any.downcast_ref::<::std::sync::Arc<$concrete>>()?;
                let coerce = $coerce;
                ::core::option::Option::Some(coerce(unit))
            },
            |any| {
                let unit = any.downcast_ref::<::std::sync::Arc<$concrete>>()?;
                ::core::option::Option::Some(::std::boxed::Box::new(::std::sync::Arc::clone(unit)))
            },
        ))
    };
}
