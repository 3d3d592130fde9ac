//! Prints the Astro CustomResourceDefinition as YAML
//!
//! `astro-crdgen | kubectl apply -f -`

use astro_operator::crd::Astro;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&Astro::crd())?);
    Ok(())
}
