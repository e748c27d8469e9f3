//! Change record classification

use runstate_core::{layout, ChangeRecord, Notification, Operation, GLOBAL_STATE_PATH};

/// Turn a raw record into a notification, relative to the program-parent path.
///
/// Directory records outside the parent itself are not classifiable.
pub fn classify(record: &ChangeRecord, parent: &str) -> Option<Notification> {
    match record.operation {
        Operation::Assign => {
            if record.path == GLOBAL_STATE_PATH {
                return Some(Notification::GlobalStateChange {
                    state: record.data.clone(),
                });
            }
            if let Some(program) = layout::program_of_state_path(&record.path, parent) {
                return Some(Notification::ProgramStateChange {
                    program: program.to_string(),
                    state: record.data.clone(),
                });
            }
            Some(Notification::VarChanged {
                path: record.path.clone(),
                value: record.data.clone(),
            })
        }
        Operation::Mkdir if is_parent(&record.path, parent) => Some(Notification::ProgramJoins {
            program: record.data.clone(),
        }),
        Operation::Rmdir if is_parent(&record.path, parent) => Some(Notification::ProgramLeaves {
            program: record.data.clone(),
        }),
        Operation::Mkdir | Operation::Rmdir => None,
    }
}

fn is_parent(path: &str, parent: &str) -> bool {
    path.trim_end_matches('/') == parent.trim_end_matches('/')
}
