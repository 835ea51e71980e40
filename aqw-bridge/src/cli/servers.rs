//! Known game servers
//!
//! The same name -> address table the mobile app offers on its server
//! selection screen.

pub const SERVERS: &[(&str, &str)] = &[
    ("Twilly", "socket5.aq.com:5588"),
    ("Artix", "socket.aq.com:5588"),
    ("Gravelyn", "socket4.aq.com:5589"),
    ("Sir Ver", "socket2.aq.com:5588"),
    ("Galanoth", "socket6.aq.com:5589"),
    ("Yorumi", "socket3.aq.com:5588"),
    ("Espada", "socket2.aq.com:5591"),
    ("Twig", "socket4.aq.com:5588"),
    ("Sepulchure", "socket2.aq.com:5590"),
    ("Safiria", "socket6.aq.com:5588"),
    ("Swordhaven", "euro.aqw.artix.com:5588"),
    ("Alteon", "socket4.aq.com:5590"),
    ("Yokai", "asia.game.artix.com:5588"),
];

/// Find a server address by name, ignoring case
pub fn lookup(name: &str) -> Option<&'static str> {
    let name = name.trim();
    SERVERS
        .iter()
        .find(|(server, _)| server.eq_ignore_ascii_case(name))
        .map(|(_, addr)| *addr)
}

pub fn names() -> Vec<&'static str> {
    SERVERS.iter().map(|(name, _)| *name).collect()
}

pub fn print_table() {
    println!("🗺️  Known servers: {}", SERVERS.len());
    for (name, addr) in SERVERS {
        println!("   {name:<12} {addr}");
    }
    println!();
    println!("💡 Usage: aqw-bridge --server <NAME>");
}
