use std::net::Ipv4Addr;

use pnet::{
    packet::{
        arp::{ArpHardwareTypes, ArpOperations, ArpPacket, MutableArpPacket},
        ethernet::{EtherTypes, EthernetPacket, MutableEthernetPacket},
        MutablePacket, Packet,
    },
    util::MacAddr,
};

const ETHERNET_HEADER_LEN: usize = 14;
const ARP_BODY_LEN: usize = 28;

/// Builds `Ether(dst=broadcast) / ARP(who-has) / trailer`.
pub fn build_request(src_mac: MacAddr, src_ip: Ipv4Addr, dst_ip: Ipv4Addr, trailer: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; ETHERNET_HEADER_LEN + ARP_BODY_LEN + trailer.len()];

    // buffer is sized for both headers, the constructors cannot fail
    let mut ether = MutableEthernetPacket::new(&mut buf[..]).unwrap();
    ether.set_destination(MacAddr::broadcast());
    ether.set_source(src_mac);
    ether.set_ethertype(EtherTypes::Arp);

    let payload = ether.payload_mut();
    let mut arp = MutableArpPacket::new(&mut payload[..ARP_BODY_LEN]).unwrap();
    arp.set_hardware_type(ArpHardwareTypes::Ethernet);
    arp.set_protocol_type(EtherTypes::Ipv4);
    arp.set_hw_addr_len(6);
    arp.set_proto_addr_len(4);
    arp.set_operation(ArpOperations::Request);
    arp.set_sender_hw_addr(src_mac);
    arp.set_sender_proto_addr(src_ip);
    arp.set_target_hw_addr(MacAddr::zero());
    arp.set_target_proto_addr(dst_ip);

    payload[ARP_BODY_LEN..].copy_from_slice(trailer);
    buf
}

/// An ARP request frame addressed to the Ethernet broadcast address.
pub struct ArpRequest<'a> {
    pub sender_mac: MacAddr,
    pub sender_ip: Ipv4Addr,
    /// Whatever follows the ARP body: padding or an INT header.
    pub trailer: &'a [u8],
}

pub fn parse_broadcast_request(frame: &[u8]) -> Option<ArpRequest<'_>> {
    let ether = EthernetPacket::new(frame)?;
    if ether.get_ethertype() != EtherTypes::Arp || ether.get_destination() != MacAddr::broadcast() {
        return None;
    }

    let arp = ArpPacket::new(ether.payload())?;
    if arp.get_operation() != ArpOperations::Request {
        return None;
    }

    let body = frame.get(ETHERNET_HEADER_LEN..)?;
    Some(ArpRequest {
        sender_mac: arp.get_sender_hw_addr(),
        sender_ip: arp.get_sender_proto_addr(),
        trailer: &body[ARP_BODY_LEN..],
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn request_round_trip() {
        let mac = MacAddr::new(0, 0, 0, 0, 1, 1);
        let frame = build_request(
            mac,
            Ipv4Addr::new(10, 0, 1, 1),
            Ipv4Addr::new(10, 0, 2, 2),
            &[1, 2, 3],
        );
        assert_eq!(frame.len(), 45);

        let req = parse_broadcast_request(&frame).expect("broadcast request");
        assert_eq!(req.sender_mac, mac);
        assert_eq!(req.sender_ip, Ipv4Addr::new(10, 0, 1, 1));
        assert_eq!(req.trailer, &[1, 2, 3]);
    }

    #[test]
    fn ignores_replies_unicast_and_other_ethertypes() {
        let mac = MacAddr::new(0, 0, 0, 0, 1, 1);
        let ip = Ipv4Addr::new(10, 0, 1, 1);

        let mut reply = build_request(mac, ip, ip, &[]);
        MutableArpPacket::new(&mut reply[ETHERNET_HEADER_LEN..])
            .unwrap()
            .set_operation(ArpOperations::Reply);
        assert!(parse_broadcast_request(&reply).is_none());

        let mut unicast = build_request(mac, ip, ip, &[]);
        MutableEthernetPacket::new(&mut unicast[..])
            .unwrap()
            .set_destination(MacAddr::new(0, 0, 0, 0, 2, 2));
        assert!(parse_broadcast_request(&unicast).is_none());

        let mut ipv4 = build_request(mac, ip, ip, &[]);
        MutableEthernetPacket::new(&mut ipv4[..])
            .unwrap()
            .set_ethertype(EtherTypes::Ipv4);
        assert!(parse_broadcast_request(&ipv4).is_none());

        assert!(parse_broadcast_request(&[0u8; 10]).is_none());
    }
}
