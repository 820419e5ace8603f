use clap::Subcommand;
use serde_json::{json, Value};

use crate::api::{PortalClient, Resource, ResourceRecord};
use crate::cli::utils::{authenticated_client, output_empty_collection, output_success, read_json_stdin, record_label};
use crate::cli::OutputFormat;
use crate::list::{ListController, ListOptions, ListState};
use crate::models::{MataPelajaran, Student, Teacher, UserAccount};

#[derive(Subcommand)]
pub enum DataCommands {
    #[command(about = "List one page of a resource (users, teachers, students, mata-pelajaran)")]
    List {
        #[arg(help = "Resource name")]
        resource: Resource,
        #[arg(long, default_value_t = 1, help = "Page number")]
        page: u32,
        #[arg(long, help = "Search term")]
        search: Option<String>,
        #[arg(long, help = "Walk every page after the first")]
        all: bool,
    },

    #[command(about = "Create record from stdin")]
    Create {
        #[arg(help = "Resource name")]
        resource: Resource,
    },

    #[command(about = "Update record from stdin")]
    Update {
        #[arg(help = "Resource name")]
        resource: Resource,
        #[arg(help = "Record ID to update")]
        id: String,
    },

    #[command(about = "Delete record")]
    Delete {
        #[arg(help = "Resource name")]
        resource: Resource,
        #[arg(help = "Record ID to delete")]
        id: String,
    },
}

pub async fn handle(cmd: DataCommands, api_url: Option<String>, output_format: OutputFormat) -> anyhow::Result<()> {
    let client = authenticated_client(api_url)?;

    match cmd {
        DataCommands::List { resource, page, search, all } => {
            let options = ListOptions::labeled(resource.path())
                .page(page)
                .search(search.unwrap_or_default());
            match resource {
                Resource::Users => list::<UserAccount>(&client, options, all, output_format).await,
                Resource::Teachers => list::<Teacher>(&client, options, all, output_format).await,
                Resource::Students => list::<Student>(&client, options, all, output_format).await,
                Resource::MataPelajaran => list::<MataPelajaran>(&client, options, all, output_format).await,
            }
        }
        DataCommands::Create { resource } => {
            let body = read_json_stdin()?;
            let record = match resource {
                Resource::Users => create::<UserAccount>(&client, body).await?,
                Resource::Teachers => create::<Teacher>(&client, body).await?,
                Resource::Students => create::<Student>(&client, body).await?,
                Resource::MataPelajaran => create::<MataPelajaran>(&client, body).await?,
            };
            output_success(
                &output_format,
                &format!("Created {} '{}'", resource.noun(), record_label(&record)),
                Some(json!({ "record": record })),
            )
        }
        DataCommands::Update { resource, id } => {
            let body = read_json_stdin()?;
            let record = match resource {
                Resource::Users => update::<UserAccount>(&client, &id, body).await?,
                Resource::Teachers => update::<Teacher>(&client, &id, body).await?,
                Resource::Students => update::<Student>(&client, &id, body).await?,
                Resource::MataPelajaran => update::<MataPelajaran>(&client, &id, body).await?,
            };
            output_success(
                &output_format,
                &format!("Updated {} {}", resource.noun(), id),
                Some(json!({ "record": record })),
            )
        }
        DataCommands::Delete { resource, id } => {
            client.delete(resource, &id).await?;
            output_success(&output_format, &format!("Deleted {} {}", resource.noun(), id), Some(json!({ "id": id })))
        }
    }
}

async fn list<R: ResourceRecord>(
    client: &PortalClient,
    options: ListOptions,
    all: bool,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let controller = ListController::<R>::mount(client.fetcher::<R>(), options).await;
    let first = controller.snapshot();
    if let Some(error) = &first.error {
        return Err(anyhow::anyhow!("{}", error));
    }
    print_page(R::RESOURCE, &first, output_format)?;

    if all {
        for page in first.pagination.current + 1..=first.pagination.total_pages {
            controller.go_to_page(page).await;
            let state = controller.snapshot();
            if let Some(error) = &state.error {
                return Err(anyhow::anyhow!("{}", error));
            }
            print_page(R::RESOURCE, &state, output_format)?;
        }
    }

    controller.unmount();
    Ok(())
}

fn print_page<R: ResourceRecord>(resource: Resource, state: &ListState<R>, output_format: OutputFormat) -> anyhow::Result<()> {
    if state.data.is_empty() {
        return output_empty_collection(&output_format, resource.path(), &format!("No {} found", resource.path()));
    }

    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(state)?),
        OutputFormat::Text => {
            let pagination = &state.pagination;
            println!(
                "{} page {}/{} ({} total)",
                resource.path(),
                pagination.current,
                pagination.total_pages,
                pagination.total
            );
            for record in &state.data {
                let value = serde_json::to_value(record)?;
                println!("  {}  {}", record.id(), record_label(&value));
            }
        }
    }
    Ok(())
}

async fn create<R: ResourceRecord>(client: &PortalClient, body: Value) -> anyhow::Result<Value> {
    let input: R::Input = serde_json::from_value(body)?;
    let record = client.create::<R>(&input).await?;
    Ok(serde_json::to_value(record)?)
}

async fn update<R: ResourceRecord>(client: &PortalClient, id: &str, body: Value) -> anyhow::Result<Value> {
    let input: R::Input = serde_json::from_value(body)?;
    let record = client.update::<R>(id, &input).await?;
    Ok(serde_json::to_value(record)?)
}
