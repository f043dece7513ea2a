/*============================================================
  Synavera Project: KM-Confluence
  Module: km_confluence::registry
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Resolve service identifiers to descriptors, falling back
    to a generic descriptor that only uses base defaults.

  Dependencies:
    None beyond std.

  Revision History:
    2025-02-11 COD  Added service registry.
============================================================*/

use std::collections::BTreeMap;

use crate::service::ServiceDescriptor;

/// Descriptor overriding nothing: every call lands on the base defaults.
pub struct GenericDescriptor {
    id: String,
}

impl GenericDescriptor {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}

impl ServiceDescriptor for GenericDescriptor {
    fn id(&self) -> &str {
        &self.id
    }
}

pub struct ServiceRegistry {
    descriptors: BTreeMap<String, Box<dyn ServiceDescriptor>>,
    fallback: GenericDescriptor,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self {
            descriptors: BTreeMap::new(),
            fallback: GenericDescriptor::new("service"),
        }
    }
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: Box<dyn ServiceDescriptor>) {
        self.descriptors
            .insert(descriptor.id().to_string(), descriptor);
    }

    /// Descriptor for `id` or its closest registered parent namespace
    /// (`service:km:confluence:dig` resolves to `service:km:confluence`),
    /// else the generic descriptor.
    pub fn resolve(&self, id: &str) -> &dyn ServiceDescriptor {
        let mut candidate = id;
        loop {
            if let Some(descriptor) = self.descriptors.get(candidate) {
                return descriptor.as_ref();
            }
            match candidate.rfind(':') {
                Some(index) => candidate = &candidate[..index],
                None => return &self.fallback,
            }
        }
    }
}
