use std::collections::HashMap;

use crate::io::ConnectionKey;
use crate::protocol::{ComponentId, SystemId, Target};

/// Learned address table.
///
/// Maps `(system, component)` to the connection on which that endpoint was
/// last observed, last-writer-wins. Entries have no TTL: they persist until
/// overwritten or the router restarts, so a stale route may point at a
/// connection that is no longer in the connection map. Such recipients are
/// skipped at dispatch time.
#[derive(Debug, Default)]
pub(crate) struct RouteTable {
    routes: HashMap<(SystemId, ComponentId), ConnectionKey>,
}

impl RouteTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records that `(system, component)` was last seen on `key`.
    ///
    /// The local connection is never recorded: local frames are routed by
    /// the policy, not by address learning.
    pub(crate) fn learn(&mut self, system: SystemId, component: ComponentId, key: &ConnectionKey) {
        if *key == ConnectionKey::Local {
            return;
        }
        self.routes.insert((system, component), key.clone());
    }

    /// Connections that match a target under the wildcard-zero rule: a zero
    /// in the target means "any", a nonzero must equal exactly.
    pub(crate) fn matching(
        &self,
        target_system: SystemId,
        target_component: ComponentId,
    ) -> impl Iterator<Item = &ConnectionKey> {
        self.routes
            .iter()
            .filter(move |((system, component), _)| {
                (target_system == 0 || *system == target_system)
                    && (target_component == 0 || *component == target_component)
            })
            .map(|(_, key)| key)
    }

    #[cfg(test)]
    pub(crate) fn get(&self, system: SystemId, component: ComponentId) -> Option<&ConnectionKey> {
        self.routes.get(&(system, component))
    }
}

/// Recipients of a routed frame.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Recipients {
    /// Remote connections to forward to, deduplicated.
    pub(crate) remote: Vec<ConnectionKey>,
    /// Whether the frame is delivered to local subscribers.
    pub(crate) local: bool,
}

/// Applies the routing policy to a validated frame.
///
/// Broadcast frames go to every connection except the one they arrived on,
/// plus the local connection (unless local echo is disabled and the frame
/// originated locally). Targeted frames go to the local connection plus
/// every learned route matching the target; the source is *not* excluded,
/// since targeting is address-based.
pub(crate) fn select_recipients<'a>(
    src: &ConnectionKey,
    target: Target,
    table: &RouteTable,
    connections: impl Iterator<Item = &'a ConnectionKey>,
    echo_local_broadcast: bool,
) -> Recipients {
    let local_origin = *src == ConnectionKey::Local;

    match target {
        Target::Broadcast => Recipients {
            remote: connections.filter(|key| *key != src).cloned().collect(),
            local: echo_local_broadcast || !local_origin,
        },
        Target::System { system } => targeted(table, system, 0),
        Target::Component { system, component } => targeted(table, system, component),
    }
}

fn targeted(table: &RouteTable, system: SystemId, component: ComponentId) -> Recipients {
    let mut remote: Vec<ConnectionKey> = Vec::new();
    for key in table.matching(system, component) {
        if !remote.contains(key) {
            remote.push(key.clone());
        }
    }
    Recipients {
        remote,
        local: true,
    }
}

#[cfg(test)]
mod routing_tests {
    use super::*;

    fn udp_peer(port: u16) -> ConnectionKey {
        ConnectionKey::UdpPeer {
            bind_addr: "127.0.0.1:14550".parse().unwrap(),
            peer_addr: format!("127.0.0.1:{port}").parse().unwrap(),
        }
    }

    #[test]
    fn local_is_never_learned() {
        let mut table = RouteTable::new();
        table.learn(1, 1, &ConnectionKey::Local);
        assert_eq!(table.get(1, 1), None);
    }

    #[test]
    fn last_writer_wins() {
        let mut table = RouteTable::new();
        let (a, b) = (udp_peer(40000), udp_peer(40001));

        table.learn(1, 1, &a);
        assert_eq!(table.get(1, 1), Some(&a));

        table.learn(1, 1, &b);
        assert_eq!(table.get(1, 1), Some(&b));
    }

    #[test]
    fn wildcard_zero_matches_any() {
        let mut table = RouteTable::new();
        let (a, b) = (udp_peer(40000), udp_peer(40001));
        table.learn(1, 1, &a);
        table.learn(2, 200, &b);

        let matching: Vec<_> = table.matching(0, 0).collect();
        assert_eq!(matching.len(), 2);

        let matching: Vec<_> = table.matching(1, 0).collect();
        assert_eq!(matching, vec![&a]);

        let matching: Vec<_> = table.matching(2, 200).collect();
        assert_eq!(matching, vec![&b]);

        let matching: Vec<_> = table.matching(2, 1).collect();
        assert!(matching.is_empty());
    }

    #[test]
    fn broadcast_excludes_the_source() {
        let table = RouteTable::new();
        let (a, b) = (udp_peer(40000), udp_peer(40001));
        let connections = [a.clone(), b.clone()];

        let recipients = select_recipients(
            &a,
            Target::Broadcast,
            &table,
            connections.iter(),
            true,
        );
        assert_eq!(recipients.remote, vec![b]);
        assert!(recipients.local);
    }

    #[test]
    fn local_broadcast_reaches_everyone() {
        let table = RouteTable::new();
        let (a, b) = (udp_peer(40000), udp_peer(40001));
        let connections = [a.clone(), b.clone()];

        let recipients = select_recipients(
            &ConnectionKey::Local,
            Target::Broadcast,
            &table,
            connections.iter(),
            true,
        );
        assert_eq!(recipients.remote, vec![a, b]);
        assert!(recipients.local);
    }

    #[test]
    fn local_echo_can_be_disabled() {
        let table = RouteTable::new();

        let recipients = select_recipients(
            &ConnectionKey::Local,
            Target::Broadcast,
            &table,
            std::iter::empty(),
            false,
        );
        assert!(!recipients.local);

        // A remote broadcast is still delivered locally.
        let a = udp_peer(40000);
        let recipients =
            select_recipients(&a, Target::Broadcast, &table, [a.clone()].iter(), false);
        assert!(recipients.local);
        assert!(recipients.remote.is_empty());
    }

    #[test]
    fn targeted_follows_learned_routes_and_includes_local() {
        let mut table = RouteTable::new();
        let (a, b) = (udp_peer(40000), udp_peer(40001));
        table.learn(1, 1, &a);
        table.learn(1, 2, &b);

        let connections = [a.clone(), b.clone()];
        let recipients = select_recipients(
            &ConnectionKey::Local,
            Target::Component {
                system: 1,
                component: 1,
            },
            &table,
            connections.iter(),
            true,
        );
        assert_eq!(recipients.remote, vec![a.clone()]);
        assert!(recipients.local);

        // Wildcard component: both components of system 1, deduplicated.
        let recipients = select_recipients(
            &ConnectionKey::Local,
            Target::Component {
                system: 1,
                component: 0,
            },
            &table,
            connections.iter(),
            true,
        );
        assert_eq!(recipients.remote.len(), 2);
    }

    #[test]
    fn targeted_does_not_exclude_the_source() {
        let mut table = RouteTable::new();
        let a = udp_peer(40000);
        table.learn(1, 1, &a);

        let recipients = select_recipients(
            &a,
            Target::Component {
                system: 1,
                component: 1,
            },
            &table,
            [a.clone()].iter(),
            true,
        );
        assert_eq!(recipients.remote, vec![a]);
    }

    #[test]
    fn unmatched_target_still_reaches_local() {
        let table = RouteTable::new();
        let recipients = select_recipients(
            &ConnectionKey::Local,
            Target::System { system: 9 },
            &table,
            std::iter::empty(),
            true,
        );
        assert!(recipients.remote.is_empty());
        assert!(recipients.local);
    }
}
