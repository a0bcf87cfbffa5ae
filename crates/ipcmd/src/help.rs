//! Usage texts printed by `help` and by each object's `help` subcommand.

pub const IP: &str = "\
Usage: ip [ OPTIONS ] OBJECT { COMMAND | help }
where  OBJECT := { address | help | link | monitor | neighbor | neighbour |
                   route | tap | tcpmetrics | tunnel | tuntap | vrf | xfrm }
       OPTIONS := { -s[tatistics] | -d[etails] | -r[esolve] |
                    -h[uman-readable] | -iec | -j[son] | -p[retty] |
                    -f[amily] { inet | inet6 | mpls | bridge | link } |
                    -4 | -6 | -M | -B | -0 |
                    -l[oops] { maximum-addr-flush-attempts } | -br[ief] |
                    -o[neline] | -t[imestamp] | -ts[hort] | -b[atch] [filename] |
                    -rc[vbuf] [size] | -n[etns] name | -N[umeric] | -a[ll] |
                    -c[olor]}
";

pub const ADDRESS: &str = "\
Usage: ip address { add | change | replace } IFADDR dev IFNAME [ LIFETIME ]
                                                      [ CONFFLAG-LIST ]
       ip address del IFADDR dev IFNAME
       ip address { show | flush } [ dev IFNAME ] [ scope SCOPE-ID ]
                            [ to PREFIX ] [ FLAG-LIST ] [ label LABEL ] [ up ]
                            [ type TYPE... ]
       ip address help
IFADDR := PREFIX [ label IFNAME ] [ broadcast ADDR ] [ anycast ADDR ]
          [ scope SCOPE-ID ]
SCOPE-ID := [ host | link | global | NUMBER ]
FLAG-LIST := [ FLAG-LIST ] FLAG
FLAG  := [ permanent | dynamic ]
CONFFLAG-LIST := [ CONFFLAG-LIST ] CONFFLAG
CONFFLAG  := [ home | nodad | mngtmpaddr | noprefixroute | autojoin ]
LIFETIME := [ valid_lft LFT ] [ preferred_lft LFT ]
LFT := forever | SECONDS
";

pub const LINK: &str = "\
Usage: ip link add [ name ] NAME
                   [ txqueuelen PACKETS ]
                   [ address LLADDR ]
                   [ mtu MTU ] [ index IDX ]
                   [ numtxqueues QUEUE_COUNT ]
                   [ numrxqueues QUEUE_COUNT ]
                   type TYPE [ ARGS ]

       ip link delete { DEVICE | dev DEVICE }

       ip link set { DEVICE | dev DEVICE }
                   [ { up | down } ]
                   [ arp { on | off } ]
                   [ multicast { on | off } ]
                   [ allmulticast { on | off } ]
                   [ promisc { on | off } ]
                   [ txqueuelen PACKETS ]
                   [ name NEWNAME ]
                   [ address LLADDR ]
                   [ mtu MTU ]
                   [ group GROUP ]
                   [ netns { PID | NAME } ]
                   [ alias NAME ]
                   [ master DEVICE ] [ nomaster ]
                   [ vf NUM [ mac LLADDR ]
                            [ vlan VLANID [ qos VLAN-QOS ] ]
                            [ rate TXRATE ]
                            [ max_tx_rate TXRATE ]
                            [ min_tx_rate TXRATE ]
                            [ spoofchk { on | off } ]
                            [ state { auto | enable | disable } ]
                            [ trust { on | off } ]
                            [ node_guid EUI64 ]
                            [ port_guid EUI64 ] ]

       ip link show [ DEVICE ] [ type TYPE ]

       ip link help

TYPE := { bareudp | bond | bridge | dummy |
          geneve | gre | gretap | ifb |
          ip6gre | ip6tnl | ipip | ipoib |
          ipvlan | ipvtap | macvlan | sit |
          veth | vlan | vrf | vti | vti6 |
          vxlan | xfrm }
";

pub const ROUTE: &str = "\
Usage: ip route { list | flush } SELECTOR
       ip route get ADDRESS
                    [ from ADDRESS ] [ iif STRING ]
                    [ oif STRING ] [ vrf NAME ]
       ip route { add | del | append | replace } ROUTE
       ip route help
SELECTOR := [ root PREFIX ] [ match PREFIX ] [ exact PREFIX ]
            [ table TABLE_ID ] [ proto RTPROTO ]
            [ type TYPE ] [ scope SCOPE ]
ROUTE := NODE_SPEC [ INFO_SPEC ]
NODE_SPEC := [ TYPE ] PREFIX [ tos TOS ]
             [ table TABLE_ID ] [ proto RTPROTO ]
             [ scope SCOPE ] [ metric METRIC ] OPTIONS
INFO_SPEC := [ via ADDRESS ] [ dev STRING ] [ nexthop NH ]...
NH := via ADDRESS [ dev STRING ] [ weight NUMBER ] [ onlink ]
OPTIONS := FLAGS [ mtu NUMBER ] [ advmss NUMBER ]
           [ rtt TIME ] [ rttvar TIME ] [ reordering NUMBER ]
           [ window NUMBER ] [ cwnd NUMBER ] [ initcwnd NUMBER ]
           [ ssthresh NUMBER ] [ realms REALM ] [ src ADDRESS ]
           [ rto_min TIME ] [ hoplimit NUMBER ] [ initrwnd NUMBER ]
           [ features FEATURES ] [ quickack BOOL ] [ congctl NAME ]
           [ fastopen_no_cookie BOOL ] [ onlink ]
TYPE := { unicast | local | broadcast | multicast | throw |
          unreachable | prohibit | blackhole | nat }
TABLE_ID := [ local | main | default | all | NUMBER ]
SCOPE := [ host | link | global | NUMBER ]
BOOL := [1|0]
";

pub const NEIGH: &str = "\
Usage: ip neigh { add | del | change | replace }
                { ADDR [ lladdr LLADDR ] [ nud STATE ] | proxy ADDR }
                dev DEV [ router ] [ extern_learn ]
       ip neigh { show | flush } [ proxy ] [ to PREFIX ] [ dev DEV ] [ nud STATE ]
       ip neigh get ADDR dev DEV
       ip neigh help
STATE := { delay | failed | incomplete | noarp | none |
           permanent | probe | reachable | stale | all | NUMBER }
";

pub const TUNNEL: &str = "\
Usage: ip tunnel { add | del | show } [ NAME ]
        [ mode { gre | ip6gre | ipip | ip6tnl | vti | vti6 | sit } ]
        [ remote ADDR ] [ local ADDR ]
        [ [i|o]key KEY ]
        [ ttl TTL ] [ tos TOS ] [ dev PHYS_DEV ]

Where: NAME := STRING
       ADDR := { IP_ADDRESS | any }
       TOS  := { 1..255 }
       TTL  := { 1..255 | inherit }
       KEY  := { NUMBER }
";

pub const TUNTAP: &str = "\
Usage: ip tuntap { add | del | show | list | help } [ dev PHYS_DEV ]
       [ mode { tun | tap } ] [ user USER ] [ group GROUP ]
       [ one_queue ] [ pi ] [ vnet_hdr ] [ multi_queue ]
       [ name NAME ]

Where: USER  := { STRING | NUMBER }
       GROUP := { STRING | NUMBER }
";

pub const VRF: &str = "\
Usage: ip vrf show [ NAME ]
       ip vrf add NAME table TABLE_ID
       ip vrf delete NAME
       ip vrf enslave DEV NAME
       ip vrf release DEV
       ip vrf help
";

pub const MONITOR: &str = "\
Usage: ip monitor [ all | OBJECTS ]
OBJECTS := { address | link | neigh | route }
";

pub const TCP_METRICS: &str = "\
Usage: ip tcp_metrics help
";

pub const XFRM: &str = "\
Usage: ip xfrm XFRM-OBJECT { COMMAND | help }
where  XFRM-OBJECT := state | policy | monitor
";

pub const XFRM_MONITOR: &str = "\
Usage: ip xfrm monitor [ nokeys ] [ all-nsid ] [ all | OBJECTS | help ]
OBJECTS := { acquire | expire | SA | aevent | policy | report }
";

pub const XFRM_POLICY: &str = "\
Usage: ip xfrm policy { add | update } SELECTOR dir DIR
        [ mark MARK [ mask MASK ] ] [ index INDEX ]
        [ action ACTION ] [ priority PRIORITY ] [ if_id IF_ID ] [ TMPL-LIST ]
Usage: ip xfrm policy { delete | get } { SELECTOR | index INDEX } dir DIR
        [ mark MARK [ mask MASK ] ] [ if_id IF_ID ]
Usage: ip xfrm policy { deleteall | list } [ SELECTOR ] [ dir DIR ]
        [ index INDEX ] [ action ACTION ] [ priority PRIORITY ]
Usage: ip xfrm policy flush [ dir DIR ]
Usage: ip xfrm policy count
SELECTOR := [ src ADDR[/PLEN] ] [ dst ADDR[/PLEN] ] [ UPSPEC ]
UPSPEC := proto { { tcp | udp | sctp | dccp } [ sport PORT ] [ dport PORT ] }
DIR := in | out | fwd
ACTION := allow | block
TMPL-LIST := [ TMPL-LIST ] tmpl TMPL
TMPL := ID [ mode MODE ] [ reqid REQID ] [ level LEVEL ]
ID := [ src ADDR ] [ dst ADDR ] [ proto XFRM-PROTO ] [ spi SPI ]
XFRM-PROTO := esp | ah | comp | route2 | hao
MODE := transport | tunnel | beet | ro | in_trigger
LEVEL := required | use
";

pub const XFRM_STATE: &str = "\
Usage: ip xfrm state { add | update } ID [ ALGO-LIST ] [ mode MODE ]
        [ mark MARK [ mask MASK ] ] [ reqid REQID ] [ replay-window SIZE ]
        [ LIMIT-LIST ] [ encap ENCAP ]
        [ output-mark OUTPUT-MARK [ mask MASK ] ] [ if_id IF_ID ]
Usage: ip xfrm state allocspi ID [ mode MODE ] [ mark MARK [ mask MASK ] ]
        [ reqid REQID ] [ min SPI max SPI ]
Usage: ip xfrm state { delete | get } ID [ mark MARK [ mask MASK ] ]
Usage: ip xfrm state deleteall [ ID ] [ mode MODE ] [ reqid REQID ]
Usage: ip xfrm state list [ nokeys ] [ ID ] [ mode MODE ] [ reqid REQID ]
Usage: ip xfrm state flush [ proto XFRM-PROTO ]
Usage: ip xfrm state count
ID := [ src ADDR ] [ dst ADDR ] [ proto XFRM-PROTO ] [ spi SPI ]
XFRM-PROTO := esp | ah | comp | route2 | hao
ALGO-LIST := [ ALGO-LIST ] ALGO
ALGO := { enc | auth } ALGO-NAME ALGO-KEYMAT |
        auth-trunc ALGO-NAME ALGO-KEYMAT ALGO-TRUNC-LEN |
        aead ALGO-NAME ALGO-KEYMAT ALGO-ICV-LEN
MODE := transport | tunnel | beet | ro | in_trigger
LIMIT-LIST := [ LIMIT-LIST ] limit LIMIT
LIMIT := { time-soft | time-hard | time-use-soft | time-use-hard } SECONDS |
         { byte-soft | byte-hard } SIZE | { packet-soft | packet-hard } COUNT
ENCAP := { espinudp | espinudp-nonike | espintcp } SPORT DPORT OADDR
";
