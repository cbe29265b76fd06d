// 主机目录端到端测试：证据文件 -> 自动发现 -> 存储

use std::fs;
use std::net::IpAddr;
use std::path::Path;

use hostbook::services::discovery::{AddressResolver, Discovery, DiscoveryOptions, EvidencePaths};
use hostbook::services::HostStore;
use hostbook::{ErrorKind, HostDirectory, NewHost};

struct StaticResolver;

impl AddressResolver for StaticResolver {
    fn lookup(&self, hostname: &str) -> Vec<IpAddr> {
        match hostname {
            "box.example.com" => vec!["192.0.2.10".parse().unwrap()],
            _ => Vec::new(),
        }
    }
}

fn open_directory(dir: &Path, options: DiscoveryOptions) -> HostDirectory {
    let paths = EvidencePaths {
        known_hosts: Some(dir.join("known_hosts")),
        ssh_config: Some(dir.join("config")),
        history: vec![dir.join("zsh_history")],
    };
    let discovery = Discovery::new(paths, options, Box::new(StaticResolver), "user");
    let store = HostStore::open(dir.join("hosts.json")).unwrap();
    HostDirectory::new(store, discovery)
}

#[test]
fn discovers_hosts_from_known_hosts() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("known_hosts"),
        "box.example.com ssh-ed25519 AAAAC3Nza\n[10.0.0.5]:2222 ssh-rsa AAAAB3Nza\n|1|hash= ssh-rsa CCCC\n",
    )
    .unwrap();
    let directory = open_directory(dir.path(), DiscoveryOptions::default());

    assert_eq!(directory.run_discovery().unwrap(), 2);

    let boxed = directory.get_host("box").unwrap();
    assert_eq!(boxed.hostname, "box.example.com");
    assert_eq!(boxed.port, 22);
    assert_eq!(boxed.username, "user");
    assert_eq!(boxed.ip_address.as_deref(), Some("192.0.2.10"));
    assert!(boxed.description.unwrap().contains("ssh-ed25519"));
    assert_eq!(boxed.tags.as_deref(), Some("ssh-detected"));

    let bracketed = directory.get_host("10").unwrap();
    assert_eq!(bracketed.hostname, "10.0.0.5");
    assert_eq!(bracketed.port, 2222);
    assert_eq!(bracketed.ip_address.as_deref(), Some("10.0.0.5"));

    // 第二次运行没有新主机
    assert_eq!(directory.run_discovery().unwrap(), 0);
    assert_eq!(directory.list_hosts().len(), 2);
}

#[test]
fn discovery_uses_ssh_config_and_history_usernames() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("known_hosts"),
        "box.example.com ssh-ed25519 AAAA\ndb.example.com ssh-rsa BBBB\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("config"),
        "Host box\n    HostName box.example.com\n    User deploy\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("zsh_history"),
        ": 1700000000:0;ssh -p 22 ops@db.example.com\n",
    )
    .unwrap();
    let directory = open_directory(dir.path(), DiscoveryOptions::default());
    directory.run_discovery().unwrap();

    assert_eq!(directory.get_host("box").unwrap().username, "deploy");
    assert_eq!(directory.get_host("db").unwrap().username, "ops");
}

#[test]
fn existing_profiles_are_only_enriched() {
    let dir = tempfile::tempdir().unwrap();
    let directory = open_directory(dir.path(), DiscoveryOptions::default());
    directory
        .add_host(NewHost::new("box", "box.example.com", "user").description("mine"))
        .unwrap();

    fs::write(dir.path().join("known_hosts"), "box.example.com ssh-ed25519 AAAA\n").unwrap();
    fs::write(
        dir.path().join("config"),
        "Host box.example.com\n    User alice\n",
    )
    .unwrap();

    assert_eq!(directory.run_discovery().unwrap(), 0);
    let host = directory.get_host("box").unwrap();
    assert_eq!(host.username, "alice");
    assert_eq!(host.description.as_deref(), Some("mine"));
    assert_eq!(host.ip_address.as_deref(), Some("192.0.2.10"));
}

#[test]
fn delete_compacts_ids_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let directory = open_directory(dir.path(), DiscoveryOptions::default());
        for name in ["a", "b", "c", "d"] {
            directory.add_host(NewHost::new(name, "h", "u")).unwrap();
        }
        directory.remove_host(2).unwrap();
    }

    let directory = open_directory(dir.path(), DiscoveryOptions::default());
    let mut ids: Vec<_> = directory.list_hosts().iter().map(|h| (h.id, h.name.clone())).collect();
    ids.sort();
    assert_eq!(
        ids,
        vec![(1, "a".to_string()), (2, "c".to_string()), (3, "d".to_string())]
    );

    let next = directory.add_host(NewHost::new("e", "h", "u")).unwrap();
    assert_eq!(next.id, 4);
}

#[test]
fn duplicate_name_is_a_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let directory = open_directory(dir.path(), DiscoveryOptions::default());
    directory.add_host(NewHost::new("web", "a", "u")).unwrap();

    let err = directory.add_host(NewHost::new("web", "b", "u")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(directory.list_hosts().len(), 1);
}
