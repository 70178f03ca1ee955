//! Wire Protocol Tests
//!
//! Round-trips frames over an in-memory duplex stream, the same way the
//! servers and clients use them over TCP.

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::protocol::{
        read_request, read_response, write_request, write_response, GET_COMMAND, SET_COMMAND,
    };

    #[tokio::test]
    async fn test_request_round_trip() {
        let (mut client, mut server) = tokio::io::duplex(4096);

        let ttl = 60i64.to_be_bytes();
        write_request(&mut client, SET_COMMAND, &[&ttl, b"key", b"value"])
            .await
            .unwrap();

        let request = read_request(&mut server).await.unwrap();
        assert_eq!(request.command, SET_COMMAND);
        assert_eq!(request.args.len(), 3);
        assert_eq!(request.args[0], ttl.to_vec());
        assert_eq!(request.args[1], b"key".to_vec());
        assert_eq!(request.args[2], b"value".to_vec());
    }

    #[tokio::test]
    async fn test_request_with_no_args() {
        let (mut client, mut server) = tokio::io::duplex(256);

        write_request(&mut client, GET_COMMAND, &[]).await.unwrap();
        let request = read_request(&mut server).await.unwrap();
        assert_eq!(request.command, GET_COMMAND);
        assert!(request.args.is_empty());
    }

    #[tokio::test]
    async fn test_ok_response_round_trip() {
        let (mut client, mut server) = tokio::io::duplex(256);

        write_response(&mut server, &Ok(b"hello".to_vec()))
            .await
            .unwrap();

        let body = read_response(&mut client).await.unwrap();
        assert_eq!(body, b"hello".to_vec());
    }

    #[tokio::test]
    async fn test_empty_ok_response() {
        let (mut client, mut server) = tokio::io::duplex(256);

        write_response(&mut server, &Ok(Vec::new())).await.unwrap();
        let body = read_response(&mut client).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_error_response_becomes_typed_error() {
        let (mut client, mut server) = tokio::io::duplex(256);

        write_response(&mut server, &Err(Error::NotFound))
            .await
            .unwrap();

        match read_response(&mut client).await {
            Err(Error::NotFound) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_redirect_survives_the_wire() {
        let (mut client, mut server) = tokio::io::duplex(256);

        write_response(&mut server, &Err(Error::Redirect("10.0.0.9:5837".into())))
            .await
            .unwrap();

        match read_response(&mut client).await {
            Err(Error::Redirect(owner)) => assert_eq!(owner, "10.0.0.9:5837"),
            other => panic!("expected Redirect, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bad_version_is_rejected() {
        let (mut client, mut server) = tokio::io::duplex(256);

        use tokio::io::AsyncWriteExt;
        client.write_all(&[99, 1, 0, 0, 0, 0]).await.unwrap();

        let result = read_request(&mut server).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_absurd_argument_count_is_rejected() {
        let (mut client, mut server) = tokio::io::duplex(256);

        use tokio::io::AsyncWriteExt;
        // version 1, GET, one thousand arguments claimed.
        client.write_all(&[1, 1]).await.unwrap();
        client.write_all(&1000u32.to_be_bytes()).await.unwrap();

        let result = read_request(&mut server).await;
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().kind(),
            std::io::ErrorKind::InvalidData
        );
    }

    #[tokio::test]
    async fn test_oversized_chunk_is_rejected() {
        let (mut client, mut server) = tokio::io::duplex(256);

        use tokio::io::AsyncWriteExt;
        // version 1, reply ok, body length u32::MAX.
        client.write_all(&[1, 0]).await.unwrap();
        client.write_all(&u32::MAX.to_be_bytes()).await.unwrap();

        match read_response(&mut server).await {
            Err(Error::Io(err)) => {
                assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
            }
            other => panic!("expected io error, got {other:?}"),
        }
    }
}
