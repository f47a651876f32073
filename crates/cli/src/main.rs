use clap::{Parser, Subcommand};
use std::path::PathBuf;
use usuarios_core::{
    corrupt_data_policy_from_env_value, data_file_from_env_value, CoreConfig, User, UserCriteria,
    UserDraft, UserStore,
};

#[derive(Parser)]
#[command(name = "usuarios")]
#[command(about = "User record store CLI")]
struct Cli {
    /// Path of the user file (defaults to USUARIOS_DATA_FILE, then data/users.json)
    #[arg(long, global = true)]
    data_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all users
    List,
    /// Show one user
    Get {
        /// User id
        id: String,
    },
    /// Create a user
    Create {
        nombre: String,
        apellido: String,
        /// Age, 0 to 150
        #[arg(allow_negative_numbers = true)]
        edad: i64,
        email: String,
        telefono: String,
    },
    /// Delete a user
    Delete {
        /// User id
        id: String,
    },
    /// Find users whose fields match every supplied value exactly
    Find {
        #[arg(long)]
        nombre: Option<String>,
        #[arg(long)]
        apellido: Option<String>,
        #[arg(long, allow_negative_numbers = true)]
        edad: Option<i64>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        telefono: Option<String>,
    },
    /// Show store statistics
    Stats,
    /// Delete every user
    Clear,
}

fn print_user(user: &User) {
    println!(
        "ID: {}, Nombre: {} {}, Edad: {}, Email: {}, Teléfono: {}",
        user.id, user.nombre, user.apellido, user.edad, user.email, user.telefono
    );
}

fn print_users(users: &[User]) {
    if users.is_empty() {
        println!("No users found.");
    } else {
        users.iter().for_each(print_user);
    }
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("Use 'usuarios --help' for commands");
        return Ok(());
    };

    let data_file = cli
        .data_file
        .unwrap_or_else(|| data_file_from_env_value(std::env::var("USUARIOS_DATA_FILE").ok()));
    let cfg = CoreConfig::new(
        data_file,
        corrupt_data_policy_from_env_value(std::env::var("USUARIOS_ON_CORRUPT_DATA").ok())?,
    )?;
    let mut store = UserStore::open(&cfg)?;

    match command {
        Commands::List => print_users(&store.list()),
        Commands::Get { id } => match store.get_by_id(&id) {
            Some(user) => print_user(&user),
            None => eprintln!("User not found: {}", id),
        },
        Commands::Create {
            nombre,
            apellido,
            edad,
            email,
            telefono,
        } => {
            let draft = UserDraft {
                nombre: Some(nombre.into()),
                apellido: Some(apellido.into()),
                edad: Some(edad.into()),
                email: Some(email.into()),
                telefono: Some(telefono.into()),
            };
            match draft.into_new_user() {
                Ok(new_user) => {
                    let user = store.create(new_user)?;
                    println!("Created user with ID: {}", user.id);
                }
                Err(errors) => anyhow::bail!("invalid user: {}", errors.join("; ")),
            }
        }
        Commands::Delete { id } => {
            if store.delete(&id)? {
                println!("Deleted user: {}", id);
            } else {
                eprintln!("User not found: {}", id);
            }
        }
        Commands::Find {
            nombre,
            apellido,
            edad,
            email,
            telefono,
        } => {
            let criteria = UserCriteria {
                id: None,
                nombre,
                apellido,
                edad,
                email,
                telefono,
            };
            print_users(&store.find(&criteria));
        }
        Commands::Stats => {
            let stats = store.stats();
            println!("Total users: {}", stats.total);
            println!("Issued ids: {}", stats.issued_ids);
            println!("File: {}", stats.file_path.display());
            match stats.last_modified {
                Some(at) => println!("Last modified: {}", at.to_rfc3339()),
                None => println!("Last modified: unknown"),
            }
        }
        Commands::Clear => {
            let removed = store.len();
            store.clear()?;
            println!("Removed {} users", removed);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_create_with_global_data_file() {
        let cli = Cli::try_parse_from([
            "usuarios",
            "create",
            "Ana",
            "Ruiz",
            "29",
            "ana@example.com",
            "555-0100",
            "--data-file",
            "/tmp/users.json",
        ])
        .unwrap();

        assert_eq!(cli.data_file, Some(PathBuf::from("/tmp/users.json")));
        match cli.command {
            Some(Commands::Create { nombre, edad, .. }) => {
                assert_eq!(nombre, "Ana");
                assert_eq!(edad, 29);
            }
            _ => panic!("expected create"),
        }
    }

    #[test]
    fn test_parse_find_filters() {
        let cli = Cli::try_parse_from(["usuarios", "find", "--nombre", "Ana", "--edad", "29"])
            .unwrap();

        match cli.command {
            Some(Commands::Find {
                nombre,
                edad,
                email,
                ..
            }) => {
                assert_eq!(nombre.as_deref(), Some("Ana"));
                assert_eq!(edad, Some(29));
                assert_eq!(email, None);
            }
            _ => panic!("expected find"),
        }
    }

    #[test]
    fn test_negative_edad_reaches_validator() {
        let cli = Cli::try_parse_from([
            "usuarios",
            "create",
            "Ana",
            "Ruiz",
            "-1",
            "ana@example.com",
            "555-0100",
        ])
        .unwrap();

        assert!(matches!(
            cli.command,
            Some(Commands::Create { edad: -1, .. })
        ));
    }
}
