//! Benchmark workloads for the Ember object model.
//!
//! - [`bench_context`]: scene types over an arena of a given capacity
//! - [`actor_chain`]: actors each targeting the previous one
//! - [`release_order`]: deterministic shuffled indices via seed
//! - [`chain_package`]: a saved package holding an actor chain

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use ember_arena::{ArenaConfig, ObjectPtr};
use ember_package::{PackageError, PackageLinker};
use ember_reflect::ObjectContext;
use ember_test_utils::{sample_actor, scene_registry, Actor};
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Object context over the scene types with room for `capacity` objects.
pub fn bench_context(capacity: u32) -> ObjectContext {
    ObjectContext::new(ArenaConfig::new(capacity), scene_registry()).unwrap()
}

/// Create `len` actors, each targeting the one created before it.
pub fn actor_chain(cx: &ObjectContext, len: usize) -> Vec<ObjectPtr> {
    let mut chain: Vec<ObjectPtr> = Vec::with_capacity(len);
    for i in 0..len {
        let mut actor = sample_actor();
        actor.base.id = i as u32;
        actor.target = chain.last().cloned();
        chain.push(cx.create(actor).unwrap().into_object());
    }
    chain
}

/// A permutation of `0..len`, fixed by `seed`.
pub fn release_order(len: usize, seed: u64) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut order: Vec<usize> = (0..len).collect();
    for i in (1..len).rev() {
        let j = (rng.next_u64() % (i as u64 + 1)) as usize;
        order.swap(i, j);
    }
    order
}

/// Package `"chain"` exporting an [`actor_chain`] of `len` actors as
/// `"actor_0"`, `"actor_1"`, and so on.
pub fn chain_package(len: usize) -> Result<Vec<u8>, PackageError> {
    let mut linker = PackageLinker::new(bench_context(len as u32 + 16));
    linker.create_package("chain")?;
    let chain = actor_chain(linker.context(), len);
    for (i, actor) in chain.into_iter().enumerate() {
        linker.add_export("chain", &format!("actor_{i}"), actor)?;
    }
    linker.save_package("chain")
}

/// Number of actors in a chain whose head has been loaded.
pub fn chain_len(head: &ObjectPtr) -> usize {
    let mut len = 0;
    let mut next = Some(head.clone());
    while let Some(object) = next {
        len += 1;
        next = match object.cast::<Actor>() {
            Some(actor) => {
                let target = actor.read().target.clone();
                target
            }
            None => None,
        };
    }
    len
}
