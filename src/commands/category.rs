//! Category management: list, add, delete, and assign apps.

use crate::db::categories::UNCATEGORIZED;
use crate::db::store::Store;
use crate::libs::messages::Message;
use crate::libs::view::View;
use crate::{msg_info, msg_success, msg_warning};
use anyhow::Result;
use clap::{Args, Subcommand};
use dialoguer::{theme::ColorfulTheme, Confirm};

#[derive(Debug, Subcommand)]
pub enum CategoryCommand {
    /// List categories with their assigned apps
    List,
    /// Create a category
    Add { name: String },
    /// Delete a category, moving its apps to Uncategorized
    Delete {
        name: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Assign an app (process name, e.g. `code.exe`) to a category
    Assign { app: String, category: String },
}

#[derive(Debug, Args)]
pub struct CategoryArgs {
    #[command(subcommand)]
    command: CategoryCommand,
}

pub async fn cmd(args: CategoryArgs) -> Result<()> {
    let store = Store::new()?;

    match args.command {
        CategoryCommand::List => {
            let categories = store.categories.list()?;
            let mappings = store.categories.get_all_app_categories()?;
            View::categories(&categories, &mappings)?;
        }
        CategoryCommand::Add { name } => {
            if store.categories.add(&name)? {
                msg_success!(Message::CategoryAdded(name.trim().to_string()));
            } else {
                msg_info!(Message::CategoryAlreadyExists(name.trim().to_string()));
            }
        }
        CategoryCommand::Delete { name, yes } => {
            if !yes {
                let confirmed = Confirm::with_theme(&ColorfulTheme::default())
                    .with_prompt(Message::ConfirmDeleteCategory(name.clone()).to_string())
                    .default(false)
                    .interact()?;
                if !confirmed {
                    msg_info!(Message::OperationCancelled);
                    return Ok(());
                }
            }
            let moved = store.categories.delete(&name)?;
            msg_success!(Message::CategoryDeleted(name, moved));
        }
        CategoryCommand::Assign { app, category } => {
            let known = store.categories.list()?;
            if !known.iter().any(|c| c == &category) {
                msg_warning!(Message::CategoryCreatedOnAssign(category.clone()));
            }
            store.categories.set_app_category(&app, &category)?;
            if category == UNCATEGORIZED {
                msg_success!(Message::AppCategoryCleared(app));
            } else {
                msg_success!(Message::AppCategoryAssigned(app, category));
            }
        }
    }

    Ok(())
}
