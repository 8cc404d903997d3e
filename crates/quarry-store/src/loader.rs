use std::collections::HashSet;
use std::path::PathBuf;

use crate::shard::{LoadedShard, ShardStorage};

/// Restore every shard reachable from `main_files`.
///
/// Each main file's shard is loaded first; the source list it recorded then
/// names the header shards to pull in, each annotated with the main file as
/// its `dependent_tu`. A header shared between two TUs in the batch is
/// loaded once, for the first TU that names it.
///
/// Unreadable or incompatible shards are logged and reported as absent
/// (`shard: None`) so staleness checking schedules their TU for a fresh run
/// instead of trusting a corrupt blob.
pub fn load_shards_for(
    storage: &dyn ShardStorage,
    main_files: &[PathBuf],
) -> Vec<LoadedShard> {
    let mut out = Vec::new();

    // Dedup mains up front so a header that is also a batch main file is
    // processed as a main, not as someone's dependency.
    let mut mains = Vec::new();
    let mut seen: HashSet<PathBuf> = HashSet::new();
    for main in main_files {
        if seen.insert(main.clone()) {
            mains.push(main.clone());
        }
    }

    for main in mains {
        let main_shard = match storage.load_shard(&main) {
            Ok(shard) => shard,
            Err(err) => {
                tracing::warn!(
                    target = "quarry.store",
                    path = %main.display(),
                    error = %err,
                    "dropping unreadable shard"
                );
                None
            }
        };
        let sources = main_shard
            .as_ref()
            .map(|shard| shard.sources.clone())
            .unwrap_or_default();

        out.push(LoadedShard {
            absolute_path: main.clone(),
            dependent_tu: main.clone(),
            count_references: true,
            shard: main_shard,
        });

        for source in sources {
            if !seen.insert(source.clone()) {
                continue;
            }
            let shard = match storage.load_shard(&source) {
                Ok(shard) => shard,
                Err(err) => {
                    tracing::warn!(
                        target = "quarry.store",
                        path = %source.display(),
                        error = %err,
                        "dropping unreadable shard"
                    );
                    None
                }
            };
            out.push(LoadedShard {
                absolute_path: source,
                dependent_tu: main.clone(),
                count_references: false,
                shard,
            });
        }
    }

    out
}
