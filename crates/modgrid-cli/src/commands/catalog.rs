use crate::cli::CatalogArgs;
use crate::config::load_catalog;
use crate::error::Result;
use modgrid::core::catalog::registry::ShipDefinition;
use modgrid::engine::error::EngineError;

pub async fn run(args: CatalogArgs) -> Result<()> {
    let catalog = load_catalog(args.catalog.as_deref())?;

    match &args.ship {
        Some(ship) => {
            let definition = catalog.ship(ship).map_err(EngineError::from)?;
            print_ship(definition);
        }
        None => {
            for definition in catalog.ships() {
                print_ship(definition);
            }
        }
    }
    Ok(())
}

fn print_ship(ship: &ShipDefinition) {
    println!("{} ({})", ship.key, ship.label);
    for (category, techs) in &ship.categories {
        println!("  {}", category);
        for tech in techs {
            println!(
                "    {:<12} {:<28} {} module(s)",
                tech.key,
                tech.label,
                tech.modules.len()
            );
        }
    }
}
