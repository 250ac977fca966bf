//! P4 app topology description (`p4app.json`) and link delay randomization.

use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::BufReader,
    path::{Path, PathBuf},
};

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Links at the start of the template that connect hosts to switches.
pub const HOST_LINKS: usize = 4;
pub const EQUAL_DELAY_MS: u32 = 10;
pub const MAX_RANDOM_DELAY_MS: u32 = 100;
pub const MIN_SWITCHES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum P4Version {
    V1,
    V2,
}

impl P4Version {
    pub fn program(self) -> &'static str {
        match self {
            P4Version::V1 => "project.p4",
            P4Version::V2 => "project_v2.p4",
        }
    }
}

impl TryFrom<u8> for P4Version {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(P4Version::V1),
            1 => Ok(P4Version::V2),
            v => Err(Error::InvalidArgument(format!(
                "\"{}\" is an invalid version. It should be 0 or 1.",
                v
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayMode {
    /// every switch link gets the same delay
    Equal,
    /// no delay is assigned, the delay policy for this case is not defined yet
    WorstCase,
    /// uniform random delay in `[0, MAX_RANDOM_DELAY_MS]`
    Random,
}

impl TryFrom<u8> for DelayMode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(DelayMode::Equal),
            1 => Ok(DelayMode::WorstCase),
            2 => Ok(DelayMode::Random),
            v => Err(Error::InvalidArgument(format!(
                "\"{}\" is an invalid random mode. It should be 0, 1 or 2.",
                v
            ))),
        }
    }
}

impl DelayMode {
    /// The delay attribute for the next link, `None` to leave it untouched.
    pub fn delay<R: Rng + ?Sized>(self, rng: &mut R) -> Option<String> {
        match self {
            DelayMode::Equal => Some(format!("{}ms", EQUAL_DELAY_MS)),
            DelayMode::WorstCase => None,
            DelayMode::Random => Some(format!("{}ms", rng.gen_range(0..=MAX_RANDOM_DELAY_MS))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `[a, b]` or `[a, b, {attributes}]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Link {
    WithAttributes(String, String, LinkAttributes),
    Plain(String, String),
}

impl Link {
    pub fn new(a: &str, b: &str, delay: Option<String>) -> Self {
        match delay {
            Some(delay) => Link::WithAttributes(
                a.to_owned(),
                b.to_owned(),
                LinkAttributes {
                    delay: Some(delay),
                    ..Default::default()
                },
            ),
            None => Link::Plain(a.to_owned(), b.to_owned()),
        }
    }

    pub fn endpoints(&self) -> (&str, &str) {
        match self {
            Link::WithAttributes(a, b, _) | Link::Plain(a, b) => (a, b),
        }
    }

    pub fn delay(&self) -> Option<&str> {
        match self {
            Link::WithAttributes(_, _, attrs) => attrs.delay.as_deref(),
            Link::Plain(..) => None,
        }
    }

    pub fn set_delay(&mut self, delay: String) {
        if let Link::Plain(a, b) = self {
            let (a, b) = (std::mem::take(a), std::mem::take(b));
            *self = Link::WithAttributes(a, b, LinkAttributes::default());
        }
        if let Link::WithAttributes(_, _, attrs) = self {
            attrs.delay = Some(delay);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwitchConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cli_input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub switches: BTreeMap<String, SwitchConfig>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyDescription {
    pub program: String,
    pub topology: Topology,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TopologyDescription {
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Overwrites `path` with the whole document in a single write.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Points the app and every switch at the program of `version`.
    pub fn set_program(&mut self, version: P4Version) {
        self.program = version.program().to_owned();
        for switch in self.topology.switches.values_mut() {
            switch.program = Some(version.program().to_owned());
        }
    }

    /// Applies the delay mode to every link after the host links of the template.
    pub fn randomize_links<R: Rng + ?Sized>(&mut self, mode: DelayMode, rng: &mut R) {
        for link in self.topology.links.iter_mut().skip(HOST_LINKS) {
            if let Some(delay) = mode.delay(rng) {
                link.set_delay(delay);
            }
        }
    }

    /// Adds `switches` switches, one host per switch and a full switch mesh.
    /// Switch `sX` reads its runtime commands from `<commands_dir>/sX-commands.txt`.
    pub fn add_mesh<R: Rng + ?Sized>(
        &mut self,
        switches: usize,
        version: P4Version,
        mode: DelayMode,
        commands_dir: &Path,
        rng: &mut R,
    ) -> Result<()> {
        check_switch_count(switches)?;

        self.program = version.program().to_owned();
        for i in 1..=switches {
            let name = format!("s{}", i);
            let cli_input = Path::new(".").join(commands_dir).join(commands_file_name(i));
            self.topology.switches.insert(
                name,
                SwitchConfig {
                    cli_input: Some(cli_input.to_string_lossy().into_owned()),
                    program: Some(version.program().to_owned()),
                    extra: Map::new(),
                },
            );
        }

        for i in 1..=switches {
            self.topology
                .links
                .push(Link::new(&format!("h{}", i), &format!("s{}", i), None));
        }

        for i in 1..=switches {
            for j in i + 1..=switches {
                self.topology.links.push(Link::new(
                    &format!("s{}", i),
                    &format!("s{}", j),
                    mode.delay(rng),
                ));
            }
        }

        Ok(())
    }
}

pub fn check_switch_count(switches: usize) -> Result<()> {
    if switches < MIN_SWITCHES {
        return Err(Error::InvalidArgument(format!(
            "\"{}\" is an invalid number of switches. It should be >= {}.",
            switches, MIN_SWITCHES
        )));
    }
    Ok(())
}

pub fn commands_file_name(switch: usize) -> String {
    format!("s{}-commands.txt", switch)
}

/// Runtime commands of switch `switch` (1-based) in a mesh of `switches`:
/// a multicast group spanning every port and the switch id table.
pub fn switch_commands(switch: usize, switches: usize) -> String {
    let ports: Vec<String> = (0..=switches).map(|p| p.to_string()).collect();

    let mut commands = vec![
        "mc_mgrp_create 1".to_owned(),
        format!("mc_node_create {}", ports.join(" ")),
        "mc_node_associate 1 0".to_owned(),
    ];
    commands.extend((1..=switches).map(|port| {
        format!(
            "table_add switch_id_table get_switch_id {} => {}",
            port, switch
        )
    }));
    commands.push(format!(
        "table_add l2 add_myTtl_multicast ff:ff:ff:ff:ff:ff => {}",
        switch
    ));
    commands.push("table_add host_table remove_myTtl 1 =>".to_owned());

    let mut file = commands.join("\n");
    file.push('\n');
    file
}

/// Writes `<dir>/sX-commands.txt` for every switch and returns the paths.
pub fn write_switch_commands(dir: &Path, switches: usize) -> Result<Vec<PathBuf>> {
    check_switch_count(switches)?;
    fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(switches);
    for i in 1..=switches {
        let path = dir.join(commands_file_name(i));
        fs::write(&path, switch_commands(i, switches))?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod test {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    const TEMPLATE: &str = r#"{
        "program": "project.p4",
        "switch": "simple_switch",
        "topology": {
            "assignment_strategy": "l2",
            "links": [["h1", "s1"], ["h2", "s2"], ["h3", "s3"], ["h4", "s4"],
                      ["s1", "s2"], ["s2", "s3", {}], ["s3", "s4", {"bw": 10}], ["s1", "s4"]],
            "hosts": {"h1": {}, "h2": {}, "h3": {}, "h4": {}},
            "switches": {
                "s1": {"cli_input": "s1-commands.txt", "program": "project.p4"},
                "s2": {"cli_input": "s2-commands.txt", "program": "project.p4"}
            }
        }
    }"#;

    fn template() -> TopologyDescription {
        serde_json::from_str(TEMPLATE).unwrap()
    }

    fn delay_ms(link: &Link) -> u32 {
        link.delay()
            .and_then(|d| d.strip_suffix("ms"))
            .and_then(|d| d.parse().ok())
            .expect("delay of the form <N>ms")
    }

    #[test]
    fn modes_and_versions_from_integers() {
        assert_eq!(DelayMode::try_from(0u8).unwrap(), DelayMode::Equal);
        assert_eq!(DelayMode::try_from(1u8).unwrap(), DelayMode::WorstCase);
        assert_eq!(DelayMode::try_from(2u8).unwrap(), DelayMode::Random);
        assert!(matches!(
            DelayMode::try_from(3u8),
            Err(Error::InvalidArgument(_))
        ));

        assert_eq!(P4Version::try_from(1u8).unwrap().program(), "project_v2.p4");
        assert!(matches!(
            P4Version::try_from(2u8),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn equal_delay_skips_host_links() {
        let mut topo = template();
        topo.randomize_links(DelayMode::Equal, &mut StdRng::seed_from_u64(1));

        let links = &topo.topology.links;
        assert!(links[..HOST_LINKS].iter().all(|l| l.delay().is_none()));
        assert!(links[HOST_LINKS..].iter().all(|l| l.delay() == Some("10ms")));
    }

    #[test]
    fn random_delay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let mut topo = template();
            topo.randomize_links(DelayMode::Random, &mut rng);
            for link in &topo.topology.links[HOST_LINKS..] {
                assert!(delay_ms(link) <= MAX_RANDOM_DELAY_MS);
            }
        }
    }

    #[test]
    fn worst_case_leaves_links_alone() {
        let mut topo = template();
        topo.randomize_links(DelayMode::WorstCase, &mut StdRng::seed_from_u64(1));
        assert_eq!(topo, template());
    }

    #[test]
    fn unknown_keys_survive() {
        let mut topo = template();
        topo.set_program(P4Version::V2);
        topo.randomize_links(DelayMode::Equal, &mut StdRng::seed_from_u64(1));

        let value = serde_json::to_value(&topo).unwrap();
        assert_eq!(value["program"], "project_v2.p4");
        assert_eq!(value["switch"], "simple_switch");
        assert_eq!(value["topology"]["assignment_strategy"], "l2");
        assert_eq!(value["topology"]["switches"]["s2"]["program"], "project_v2.p4");
        assert_eq!(value["topology"]["links"][0], serde_json::json!(["h1", "s1"]));
        assert_eq!(
            value["topology"]["links"][6],
            serde_json::json!(["s3", "s4", {"bw": 10, "delay": "10ms"}])
        );
    }

    #[test]
    fn mesh_of_four_switches() {
        let mut topo = template();
        topo.topology.links.clear();
        topo.topology.switches.clear();
        topo.add_mesh(
            4,
            P4Version::V1,
            DelayMode::Equal,
            Path::new("runtime_commands"),
            &mut StdRng::seed_from_u64(1),
        )
        .unwrap();

        assert_eq!(topo.topology.switches.len(), 4);
        assert_eq!(
            topo.topology.switches["s3"].cli_input.as_deref(),
            Some("./runtime_commands/s3-commands.txt")
        );

        let links = &topo.topology.links;
        assert_eq!(links.len(), 4 + 6);
        assert_eq!(links[0].endpoints(), ("h1", "s1"));
        assert_eq!(links[4].endpoints(), ("s1", "s2"));
        assert_eq!(links[9].endpoints(), ("s3", "s4"));
        assert!(links[4..].iter().all(|l| l.delay() == Some("10ms")));
    }

    #[test]
    fn mesh_needs_three_switches() {
        let mut topo = template();
        let result = topo.add_mesh(
            2,
            P4Version::V1,
            DelayMode::Equal,
            Path::new("runtime_commands"),
            &mut StdRng::seed_from_u64(1),
        );
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
        assert_eq!(topo, template());
    }

    #[test]
    fn commands_of_second_switch() {
        assert_eq!(
            switch_commands(2, 3),
            "mc_mgrp_create 1\n\
             mc_node_create 0 1 2 3\n\
             mc_node_associate 1 0\n\
             table_add switch_id_table get_switch_id 1 => 2\n\
             table_add switch_id_table get_switch_id 2 => 2\n\
             table_add switch_id_table get_switch_id 3 => 2\n\
             table_add l2 add_myTtl_multicast ff:ff:ff:ff:ff:ff => 2\n\
             table_add host_table remove_myTtl 1 =>\n"
        );
    }
}
