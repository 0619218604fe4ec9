//! Filesystem-backed routine store.
//!
//! One TOML file per routine under a base directory, named after a sanitized
//! form of the routine name. Saves go through a temp file and rename so a
//! crash mid-write never leaves a half-written routine behind.

use std::fs;
use std::path::{Path, PathBuf};

use eyre::WrapErr;
use liftctl_traits::{Routine, RoutineStore};

use crate::RoutineFile;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub struct FsRoutineStore {
    dir: PathBuf,
}

impl FsRoutineStore {
    /// Open (creating if needed) a routine directory.
    pub fn open(dir: impl Into<PathBuf>) -> eyre::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .wrap_err_with(|| format!("creating routine directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.toml", sanitize(name)))
    }
}

/// Routine names come from user input; keep only filename-safe characters.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unnamed".to_owned()
    } else {
        cleaned
    }
}

impl RoutineStore for FsRoutineStore {
    fn all_routines(&mut self) -> Result<Vec<Routine>, BoxError> {
        let mut routines = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            let text = fs::read_to_string(&path)?;
            match crate::load_routine_toml(&text) {
                Ok(r) => routines.push(r),
                Err(e) => {
                    // One bad file must not hide the rest of the library.
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable routine");
                }
            }
        }
        routines.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(routines)
    }

    fn save_routine(&mut self, routine: &Routine) -> Result<(), BoxError> {
        let file = RoutineFile::from_routine(routine);
        let text = toml::to_string_pretty(&file)?;
        let path = self.path_for(&routine.name);
        let tmp = path.with_extension("toml.tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &path)?;
        tracing::debug!(path = %path.display(), "routine saved");
        Ok(())
    }

    fn delete_routine(&mut self, name: &str) -> Result<(), BoxError> {
        let path = self.path_for(name);
        fs::remove_file(&path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liftctl_traits::RoutineExercise;

    fn routine(name: &str) -> Routine {
        Routine {
            name: name.into(),
            exercises: vec![RoutineExercise {
                name: "row".into(),
                set_reps: vec![Some(10), None],
                set_weights_per_cable_kg: vec![20.0, 22.5],
                default_reps: 10,
                default_weight_kg: 20.0,
                superset_id: None,
                order_in_superset: 0,
                amrap_last_set: false,
                stall_detection_enabled: true,
                duration_secs: None,
            }],
        }
    }

    #[test]
    fn save_load_delete_cycle() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut store = FsRoutineStore::open(tmp.path()).expect("open");
        store.save_routine(&routine("pull day")).expect("save");
        store.save_routine(&routine("leg day")).expect("save");

        let all = store.all_routines().expect("load");
        assert_eq!(all.len(), 2);
        // sorted by name
        assert_eq!(all[0].name, "leg day");
        // AMRAP sentinel survives the round trip
        assert_eq!(all[1].exercises[0].set_reps, vec![Some(10), None]);

        store.delete_routine("pull day").expect("delete");
        assert_eq!(store.all_routines().expect("load").len(), 1);
    }

    #[test]
    fn hostile_names_become_safe_filenames() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut store = FsRoutineStore::open(tmp.path()).expect("open");
        store
            .save_routine(&routine("../../etc/passwd"))
            .expect("save");
        let files: Vec<_> = std::fs::read_dir(tmp.path())
            .expect("read dir")
            .map(|e| e.expect("entry").file_name())
            .collect();
        assert_eq!(files.len(), 1);
        assert!(!files[0].to_string_lossy().contains('/'));
    }
}
