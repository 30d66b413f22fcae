//! Platform connect primitives.
//!
//! `start_connect` begins a connection without waiting for the handshake;
//! `poll_connect` checks for completion without blocking.

use std::io;
use std::net::{SocketAddr, TcpStream};

#[cfg(unix)]
mod imp {
    use std::io;
    use std::mem;
    use std::net::{SocketAddr, TcpStream};
    use std::os::fd::{AsRawFd, FromRawFd};
    use std::ptr;

    pub(super) fn start_connect(addr: SocketAddr) -> io::Result<(TcpStream, bool)> {
        let domain = match addr {
            SocketAddr::V4(_) => libc::AF_INET,
            SocketAddr::V6(_) => libc::AF_INET6,
        };

        // SAFETY: plain socket(2) call; the returned descriptor is checked below.
        let fd = unsafe { libc::socket(domain, libc::SOCK_STREAM, 0) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: `fd` was just created above and is owned by nothing else.
        let stream = unsafe { TcpStream::from_raw_fd(fd) };
        stream.set_nonblocking(true)?;

        let (storage, len) = raw_socket_addr(&addr);
        // SAFETY: `storage` holds a fully initialized sockaddr of `len` bytes for
        // the socket's address family, and `fd` stays open for the call.
        let rc = unsafe {
            libc::connect(
                fd,
                ptr::addr_of!(storage).cast::<libc::sockaddr>(),
                len,
            )
        };
        if rc == 0 {
            return Ok((stream, true));
        }

        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            // The handshake continues asynchronously after EINTR as well.
            Some(libc::EINPROGRESS) | Some(libc::EINTR) => Ok((stream, false)),
            _ => Err(err),
        }
    }

    pub(super) fn poll_connect(stream: &TcpStream) -> io::Result<bool> {
        let mut pfd = libc::pollfd {
            fd: stream.as_raw_fd(),
            events: libc::POLLOUT,
            revents: 0,
        };
        // SAFETY: `pfd` is a valid pollfd for the duration of the call and the
        // count matches. A zero timeout never blocks.
        let rc = unsafe { libc::poll(&mut pfd, 1, 0) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(err);
        }
        if rc == 0 {
            return Ok(false);
        }

        if let Some(err) = stream.take_error()? {
            return Err(err);
        }
        if pfd.revents & libc::POLLOUT == 0 {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection closed before it was established",
            ));
        }
        Ok(true)
    }

    fn raw_socket_addr(addr: &SocketAddr) -> (libc::sockaddr_storage, libc::socklen_t) {
        // SAFETY: sockaddr_storage is plain data; the all-zero pattern is valid.
        let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };

        let len = match addr {
            SocketAddr::V4(v4) => {
                // SAFETY: sockaddr_in is plain data; the all-zero pattern is valid.
                let mut sin: libc::sockaddr_in = unsafe { mem::zeroed() };
                sin.sin_family = libc::AF_INET as libc::sa_family_t;
                sin.sin_port = v4.port().to_be();
                sin.sin_addr = libc::in_addr {
                    s_addr: u32::from_ne_bytes(v4.ip().octets()),
                };
                // SAFETY: sockaddr_storage is large and aligned enough for any
                // socket address type.
                unsafe {
                    ptr::write(
                        ptr::addr_of_mut!(storage).cast::<libc::sockaddr_in>(),
                        sin,
                    )
                };
                mem::size_of::<libc::sockaddr_in>()
            }
            SocketAddr::V6(v6) => {
                // SAFETY: sockaddr_in6 is plain data; the all-zero pattern is valid.
                let mut sin6: libc::sockaddr_in6 = unsafe { mem::zeroed() };
                sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
                sin6.sin6_port = v6.port().to_be();
                sin6.sin6_flowinfo = v6.flowinfo();
                sin6.sin6_addr = libc::in6_addr {
                    s6_addr: v6.ip().octets(),
                };
                sin6.sin6_scope_id = v6.scope_id();
                // SAFETY: as above.
                unsafe {
                    ptr::write(
                        ptr::addr_of_mut!(storage).cast::<libc::sockaddr_in6>(),
                        sin6,
                    )
                };
                mem::size_of::<libc::sockaddr_in6>()
            }
        };

        (storage, len as libc::socklen_t)
    }
}

#[cfg(windows)]
mod imp {
    use std::io;
    use std::mem;
    use std::net::{SocketAddr, TcpStream};
    use std::os::windows::io::{AsRawSocket, FromRawSocket, RawSocket};
    use std::ptr;
    use std::sync::Once;

    use windows_sys::Win32::Networking::WinSock::{
        connect, select, WSAGetLastError, WSASocketW, WSAStartup, AF_INET, AF_INET6, FD_SET,
        INVALID_SOCKET, IPPROTO_TCP, SOCKADDR, SOCKADDR_IN, SOCKADDR_IN6, SOCKADDR_STORAGE,
        SOCKET, SOCKET_ERROR, SOCK_STREAM, TIMEVAL, WSADATA, WSAEWOULDBLOCK,
        WSA_FLAG_NO_HANDLE_INHERIT, WSA_FLAG_OVERLAPPED,
    };

    pub(super) fn start_connect(addr: SocketAddr) -> io::Result<(TcpStream, bool)> {
        init_winsock();
        let family = match addr {
            SocketAddr::V4(_) => AF_INET,
            SocketAddr::V6(_) => AF_INET6,
        };

        // SAFETY: plain WSASocketW call with no protocol info; the result is
        // checked below.
        let sock = unsafe {
            WSASocketW(
                i32::from(family),
                SOCK_STREAM,
                IPPROTO_TCP,
                ptr::null(),
                0,
                WSA_FLAG_OVERLAPPED | WSA_FLAG_NO_HANDLE_INHERIT,
            )
        };
        if sock == INVALID_SOCKET {
            return Err(last_error());
        }
        // SAFETY: `sock` was just created above and is owned by nothing else.
        let stream = unsafe { TcpStream::from_raw_socket(sock as RawSocket) };
        stream.set_nonblocking(true)?;

        let (storage, len) = raw_socket_addr(&addr);
        // SAFETY: `storage` holds an initialized address of `len` bytes for the
        // socket's family, and `sock` stays open for the call.
        let rc = unsafe { connect(sock, ptr::addr_of!(storage).cast::<SOCKADDR>(), len) };
        if rc == 0 {
            return Ok((stream, true));
        }

        // SAFETY: reads the calling thread's last Winsock error.
        match unsafe { WSAGetLastError() } {
            WSAEWOULDBLOCK => Ok((stream, false)),
            code => Err(io::Error::from_raw_os_error(code)),
        }
    }

    pub(super) fn poll_connect(stream: &TcpStream) -> io::Result<bool> {
        let sock = stream.as_raw_socket() as SOCKET;
        let mut writable = single(sock);
        let mut failed = single(sock);
        let timeout = TIMEVAL {
            tv_sec: 0,
            tv_usec: 0,
        };
        // SAFETY: both sets hold one live socket and the zero timeout never
        // blocks. The first argument is ignored by Winsock.
        let rc = unsafe { select(0, ptr::null_mut(), &mut writable, &mut failed, &timeout) };
        if rc == SOCKET_ERROR {
            return Err(last_error());
        }
        if rc == 0 {
            return Ok(false);
        }

        // A failed connect is reported through the exception set, not SO_ERROR
        // alone.
        if failed.fd_count > 0 {
            return Err(stream.take_error()?.unwrap_or_else(|| {
                io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "connection closed before it was established",
                )
            }));
        }
        Ok(writable.fd_count > 0)
    }

    fn init_winsock() {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            // SAFETY: WSADATA is plain data and is only written by the call.
            let mut data: WSADATA = unsafe { mem::zeroed() };
            // SAFETY: `data` is valid for writes. Startup is reference counted
            // and the count is intentionally never released.
            let rc = unsafe { WSAStartup(0x0202, &mut data) };
            if rc != 0 {
                tracing::debug!(code = rc, "WSAStartup failed");
            }
        });
    }

    fn last_error() -> io::Error {
        // SAFETY: reads the calling thread's last Winsock error.
        io::Error::from_raw_os_error(unsafe { WSAGetLastError() })
    }

    fn single(sock: SOCKET) -> FD_SET {
        let mut set = FD_SET {
            fd_count: 1,
            fd_array: [0; 64],
        };
        set.fd_array[0] = sock;
        set
    }

    fn raw_socket_addr(addr: &SocketAddr) -> (SOCKADDR_STORAGE, i32) {
        // SAFETY: SOCKADDR_STORAGE is plain data; the all-zero pattern is valid.
        let mut storage: SOCKADDR_STORAGE = unsafe { mem::zeroed() };

        let len = match addr {
            SocketAddr::V4(v4) => {
                // SAFETY: SOCKADDR_IN is plain data; the all-zero pattern is valid.
                let mut sin: SOCKADDR_IN = unsafe { mem::zeroed() };
                sin.sin_family = AF_INET;
                sin.sin_port = v4.port().to_be();
                sin.sin_addr.S_un.S_addr = u32::from_ne_bytes(v4.ip().octets());
                // SAFETY: SOCKADDR_STORAGE is large and aligned enough for any
                // socket address type.
                unsafe { ptr::write(ptr::addr_of_mut!(storage).cast::<SOCKADDR_IN>(), sin) };
                mem::size_of::<SOCKADDR_IN>()
            }
            SocketAddr::V6(v6) => {
                // SAFETY: SOCKADDR_IN6 is plain data; the all-zero pattern is valid.
                let mut sin6: SOCKADDR_IN6 = unsafe { mem::zeroed() };
                sin6.sin6_family = AF_INET6;
                sin6.sin6_port = v6.port().to_be();
                sin6.sin6_flowinfo = v6.flowinfo();
                sin6.sin6_addr.u.Byte = v6.ip().octets();
                sin6.Anonymous.sin6_scope_id = v6.scope_id();
                // SAFETY: as above.
                unsafe { ptr::write(ptr::addr_of_mut!(storage).cast::<SOCKADDR_IN6>(), sin6) };
                mem::size_of::<SOCKADDR_IN6>()
            }
        };

        (storage, len as i32)
    }
}

/// Begin connecting to `addr` without waiting for the handshake. Returns the
/// stream and whether the connection is already established.
pub(crate) fn start_connect(addr: SocketAddr) -> io::Result<(TcpStream, bool)> {
    let (stream, connected) = imp::start_connect(addr)?;
    // Command frames are small and latency-sensitive.
    stream.set_nodelay(true)?;
    Ok((stream, connected))
}

/// Whether a connect started by [`start_connect`] has completed.
pub(crate) fn poll_connect(stream: &TcpStream) -> io::Result<bool> {
    imp::poll_connect(stream)
}
