use colored::Colorize;
use formsession_core::{FieldMap, MessageKind, Mode, SessionSnapshot, Status};

/// Prints the record with per-field errors, the way a dashboard card would.
pub fn snapshot(snapshot: &SessionSnapshot<FieldMap>) {
    let mode = match snapshot.mode {
        Mode::Viewing => "VIEW".bright_blue(),
        Mode::Editing => "EDIT".bright_yellow(),
    };
    let dirty = if snapshot.is_dirty {
        " (unsaved changes)".yellow().to_string()
    } else {
        String::new()
    };
    println!("[{}]{}", mode, dirty);

    for (field, value) in snapshot.current.iter() {
        let changed = snapshot.original.get(field) != Some(value);
        let marker = if changed { "*" } else { " " };
        println!("  {} {:<10} {}", marker.yellow(), field, value);
        if let Some(error) = snapshot.errors.get(field) {
            println!("    {}", error.red());
        }
    }
    // Errors set on fields that are not part of the record
    for (field, error) in &snapshot.errors {
        if snapshot.current.get(field).is_none() {
            println!("  {:<12} {}", field, error.red());
        }
    }

    if snapshot.status != Status::Idle {
        println!("{}", format!("{:?}...", snapshot.status).bright_black());
    }
    if snapshot.has_pending_reseed {
        println!(
            "{}",
            "Newer data is waiting; it will load when you cancel.".bright_black()
        );
    }
    message(snapshot);
}

pub fn message(snapshot: &SessionSnapshot<FieldMap>) {
    if let Some(message) = &snapshot.message {
        match message.kind {
            MessageKind::Success => println!("{}", message.text.green()),
            MessageKind::Error => println!("{}", message.text.red()),
        }
    }
}
