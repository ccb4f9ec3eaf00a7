//! Document assembler.
//!
//! Combines the document skeleton written by the route transform with the
//! registry's pending registrations and named components. Assembly never
//! touches the registry, so running it twice, or over its own output, yields
//! the same document.

use crate::config::Reused;
use crate::convert::SCHEMA_REF_PREFIX;
use crate::document::{DocPath, Segment, is_ref, merge_into, ref_target, reference};
use crate::error::{ComponentKind, SetupError, SetupResult};
use crate::registry::{ComponentHandle, ComponentRegistry, PendingState};
use serde_json::{Map, Value};
use tracing::{debug, instrument, trace};

/// Where a pending path leads in the document.
enum SlotLookup<'a> {
    Found(&'a mut Value),
    /// An ancestor of the slot was replaced by a reference
    BehindRef,
    Missing,
}

fn lookup<'a>(doc: &'a mut Value, path: &DocPath) -> SlotLookup<'a> {
    let mut current = doc;
    for segment in path.segments() {
        if is_ref(current) {
            return SlotLookup::BehindRef;
        }
        let next = match segment {
            Segment::Key(k) => current.as_object_mut().and_then(|m| m.get_mut(k)),
            Segment::Index(i) => current.as_array_mut().and_then(|a| a.get_mut(*i)),
        };
        match next {
            Some(value) => current = value,
            None => return SlotLookup::Missing,
        }
    }
    SlotLookup::Found(current)
}

/// Assemble the final document.
#[instrument(skip_all)]
pub fn assemble(registry: &ComponentRegistry, skeleton: &Value) -> SetupResult<Value> {
    if let Some((kind, name)) = registry.conflicts().first() {
        return Err(SetupError::ComponentConflict {
            kind: *kind,
            name: name.clone(),
        });
    }

    let mut doc = skeleton.clone();
    place_named_components(registry, &mut doc)?;

    let pending = registry.pending();
    let mut states = vec![PendingState::Registered; pending.len()];
    for (index, registration) in pending.iter().enumerate() {
        match lookup(&mut doc, &registration.path) {
            SlotLookup::Found(slot) => {
                if !is_ref(slot) {
                    merge_into(slot, &registration.fragment);
                }
            }
            SlotLookup::BehindRef => {}
            SlotLookup::Missing => {
                return Err(SetupError::UnresolvedPath {
                    path: registration.path.clone(),
                });
            }
        }
        states[index] = PendingState::Resolved;
    }

    if registry.reused() == Reused::Ref {
        promote_reused(registry, &mut doc)?;
    }

    components_mut(&mut doc, ComponentKind::Schemas)?;
    debug_assert!(states.iter().all(|s| *s == PendingState::Resolved));
    debug!(pending = pending.len(), "Document assembled");
    Ok(doc)
}

fn components_mut(doc: &mut Value, kind: ComponentKind) -> SetupResult<&mut Map<String, Value>> {
    let root = doc
        .as_object_mut()
        .ok_or_else(|| SetupError::InvalidConfig("document must be an object".into()))?;
    root.entry("components")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| SetupError::InvalidConfig("components must be an object".into()))?
        .entry(kind.as_str())
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| SetupError::InvalidConfig(format!("components.{kind} must be an object")))
}

/// Named components never replace entries already in the document.
fn place_named_components(registry: &ComponentRegistry, doc: &mut Value) -> SetupResult<()> {
    for kind in ComponentKind::ALL {
        let mut named = registry.named(kind).peekable();
        if named.peek().is_none() {
            continue;
        }
        let target = components_mut(doc, kind)?;
        for (name, fragment) in named {
            target
                .entry(name.to_string())
                .or_insert_with(|| fragment.clone());
        }
    }
    Ok(())
}

/// Promote unnamed nodes used at two or more slots of one direction.
///
/// Uses inside a subtree that another promotion replaces by a reference do not
/// count. Names are assigned in first-use order, so nested nodes, recorded
/// before their parents, come first.
fn promote_reused(registry: &ComponentRegistry, doc: &mut Value) -> SetupResult<()> {
    let pending = registry.pending();
    let mut candidates: Vec<(usize, ComponentHandle, Vec<&DocPath>)> = registry
        .entries()
        .filter(|(_, entry)| entry.uses.len() >= 2)
        .map(|(handle, entry)| {
            let paths = entry.uses.iter().map(|&i| &pending[i].path).collect();
            (entry.uses[0], handle, paths)
        })
        .collect();
    candidates.sort_by_key(|(first_use, _, _)| *first_use);

    // Outer nodes are recorded after their children: decide from the last
    // recorded backwards so that replaced subtrees are known first.
    let mut replaced: Vec<&DocPath> = Vec::new();
    let mut promoted: Vec<(ComponentHandle, Vec<&DocPath>)> = Vec::new();
    for (_, handle, paths) in candidates.into_iter().rev() {
        let effective: Vec<&DocPath> = paths
            .into_iter()
            .filter(|path| {
                !replaced
                    .iter()
                    .any(|outer| path.starts_with(outer) && path.len() > outer.len())
            })
            .collect();
        if effective.len() >= 2 {
            replaced.extend(effective.iter().skip(1).copied());
            promoted.push((handle, effective));
        }
    }
    promoted.reverse();

    let mut counter = 0usize;
    for (handle, paths) in promoted {
        let Some((first, rest)) = paths.split_first() else {
            continue;
        };
        let first_slot = match lookup(doc, first) {
            SlotLookup::Found(slot) => slot.clone(),
            SlotLookup::BehindRef => continue,
            SlotLookup::Missing => {
                return Err(SetupError::UnresolvedPath {
                    path: (*first).clone(),
                });
            }
        };

        let name = match ref_target(&first_slot, SCHEMA_REF_PREFIX) {
            Some(existing) => existing.to_string(),
            None => {
                let schemas = components_mut(doc, ComponentKind::Schemas)?;
                let name = loop {
                    let candidate = format!("__schema{counter}");
                    counter += 1;
                    if !schemas.contains_key(&candidate) {
                        break candidate;
                    }
                };
                schemas.insert(name.clone(), first_slot);
                name
            }
        };

        let fragment = reference(SCHEMA_REF_PREFIX, &name);
        for path in std::iter::once(first).chain(rest) {
            match lookup(doc, path) {
                SlotLookup::Found(slot) => *slot = fragment.clone(),
                SlotLookup::BehindRef => {}
                SlotLookup::Missing => {
                    return Err(SetupError::UnresolvedPath {
                        path: (*path).clone(),
                    });
                }
            }
        }
        trace!(handle = handle.index(), component = %name, uses = paths.len(), "Schema promoted");
    }
    Ok(())
}
