use crate::args::{Cli, Commands, ProvidersCommand, SessionsCommand};
use crate::handlers;
use agbridge_core::resolve_data_dir;
use agbridge_runtime::{Config, SessionFacade};
use anyhow::Result;

pub fn run(cli: Cli) -> Result<()> {
    let data_dir = resolve_data_dir(cli.data_dir.as_deref())?;
    let config_path = data_dir.join("config.toml");
    let format = cli.format;

    match cli.command {
        Commands::Providers { command } => match command {
            ProvidersCommand::List => {
                let config = Config::load_from(&config_path)?;
                handlers::providers::list(&config, format)
            }
            ProvidersCommand::Detect => handlers::providers::detect(&config_path, format),
        },

        Commands::Sessions { command } => {
            let config = Config::load_from(&config_path)?;
            let facade = SessionFacade::from_config(&config, &data_dir);

            match command {
                SessionsCommand::List {
                    agent,
                    limit,
                    offset,
                } => handlers::sessions::list(&facade, agent, limit, offset, format),
                SessionsCommand::Show { id, agent } => {
                    handlers::sessions::show(&facade, &id, agent, format)
                }
                SessionsCommand::Search {
                    query,
                    agent,
                    regex,
                    ignore_case,
                } => handlers::sessions::search(&facade, &query, agent, regex, ignore_case, format),
                SessionsCommand::Rename { id, name } => {
                    handlers::sessions::rename(&facade, &id, &name)
                }
                SessionsCommand::ClearName { id } => handlers::sessions::clear_name(&facade, &id),
                SessionsCommand::Delete { id, agent } => {
                    handlers::sessions::delete(&facade, &id, agent, format)
                }
                SessionsCommand::Recent => handlers::sessions::recent(&facade, format),
            }
        }

        Commands::Chat(args) => {
            let config = Config::load_from(&config_path)?;
            let facade = SessionFacade::from_config(&config, &data_dir);
            handlers::chat::handle(config, facade, args, format)
        }
    }
}
