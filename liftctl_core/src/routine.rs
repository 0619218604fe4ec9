//! Routine and superset progression.
//!
//! Navigation only ever moves an (exercise, set) index pair over an
//! immutable routine. Supersets cycle through all members at one set index
//! before advancing the index; running out of steps is a normal terminal
//! condition (`None`), never an error.

use liftctl_traits::Routine;

/// Index pair into a routine: which exercise, which set of that exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepRef {
    pub exercise: usize,
    pub set: usize,
}

impl StepRef {
    pub fn new(exercise: usize, set: usize) -> Self {
        Self { exercise, set }
    }
}

/// Exercise indices belonging to the superset `id`, in routine order.
fn superset_members(routine: &Routine, id: &str) -> Vec<usize> {
    routine
        .exercises
        .iter()
        .enumerate()
        .filter(|(_, ex)| ex.superset_id.as_deref() == Some(id))
        .map(|(i, _)| i)
        .collect()
}

fn has_set(routine: &Routine, exercise: usize, set: usize) -> bool {
    routine
        .exercises
        .get(exercise)
        .is_some_and(|ex| set < ex.set_count())
}

/// Compute the next (exercise, set) pair, or `None` when the routine is
/// complete.
pub fn next_step(routine: &Routine, current: StepRef) -> Option<StepRef> {
    let ex = routine.exercises.get(current.exercise)?;

    if let Some(id) = ex.superset_id.as_deref() {
        let members = superset_members(routine, id);
        // Next member within the superset that still has a set at this index.
        for &m in &members {
            if m > current.exercise && has_set(routine, m, current.set) {
                return Some(StepRef::new(m, current.set));
            }
        }
        // Advance the set index and restart scanning from the first member.
        let next_set = current.set + 1;
        for &m in &members {
            if has_set(routine, m, next_set) {
                return Some(StepRef::new(m, next_set));
            }
        }
        // Superset complete: first exercise after its maximum member index.
        let after = members.iter().max().map(|&m| m + 1)?;
        return (after < routine.exercises.len()).then(|| StepRef::new(after, 0));
    }

    // Linear progression.
    if has_set(routine, current.exercise, current.set + 1) {
        return Some(StepRef::new(current.exercise, current.set + 1));
    }
    let after = current.exercise + 1;
    (after < routine.exercises.len()).then(|| StepRef::new(after, 0))
}

/// Structural mirror of [`next_step`], including symmetric look-back into a
/// superset.
pub fn previous_step(routine: &Routine, current: StepRef) -> Option<StepRef> {
    let ex = routine.exercises.get(current.exercise)?;

    if let Some(id) = ex.superset_id.as_deref() {
        let members = superset_members(routine, id);
        // Previous member within the superset with a set at this index.
        for &m in members.iter().rev() {
            if m < current.exercise && has_set(routine, m, current.set) {
                return Some(StepRef::new(m, current.set));
            }
        }
        // Step the set index back and scan members from the last.
        if current.set > 0 {
            let prev_set = current.set - 1;
            for &m in members.iter().rev() {
                if has_set(routine, m, prev_set) {
                    return Some(StepRef::new(m, prev_set));
                }
            }
        }
        // Superset exhausted backwards: the exercise before its minimum
        // member index.
        let first = *members.iter().min()?;
        return last_step_before(routine, first);
    }

    if current.set > 0 {
        return Some(StepRef::new(current.exercise, current.set - 1));
    }
    last_step_before(routine, current.exercise)
}

/// The last step visited before `exercise` begins: the previous exercise's
/// final set, or, when the previous exercise belongs to a superset, the
/// superset's final (member, set) pair in traversal order.
fn last_step_before(routine: &Routine, exercise: usize) -> Option<StepRef> {
    if exercise == 0 {
        return None;
    }
    let prev = exercise - 1;
    let pex = routine.exercises.get(prev)?;
    if let Some(id) = pex.superset_id.as_deref() {
        let members = superset_members(routine, id);
        let max_sets = members
            .iter()
            .filter_map(|&m| routine.exercises.get(m).map(|e| e.set_count()))
            .max()?;
        for s in (0..max_sets).rev() {
            for &m in members.iter().rev() {
                if has_set(routine, m, s) {
                    return Some(StepRef::new(m, s));
                }
            }
        }
        return None;
    }
    let last = pex.set_count().checked_sub(1)?;
    Some(StepRef::new(prev, last))
}
