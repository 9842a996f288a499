use std::num::NonZeroUsize;

use comms::{
    FitConfig, Parameters, TENSOR_TYPE,
    msg::{ClientMsg, Reconnect, ServerMsg},
};
use tokio::io::{self, AsyncWriteExt};

#[tokio::test]
async fn fit_instruction_crosses_the_stream() {
    const SIZE: usize = 4096;

    let layers = [vec![0u8; 504], vec![1u8; 36], vec![2u8; 144], vec![3u8; 16]];
    let fit = FitConfig {
        local_epochs: NonZeroUsize::new(3).unwrap(),
        batch_size: NonZeroUsize::new(8).unwrap(),
    };

    let expected = layers.to_vec();
    let msg = ServerMsg::Fit {
        parameters: Parameters::new(&layers),
        config: fit.to_config(),
    };

    let (one, two) = io::duplex(SIZE);
    let (rx, tx) = io::split(one);
    let (_, mut tx) = comms::channel(rx, tx);
    let (peer_rx, peer_tx) = io::split(two);
    let (mut rx, _) = comms::channel(peer_rx, peer_tx);

    let send = async move { tx.send(&msg).await };
    let recv = async move {
        let mut buf = Vec::new();
        let msg: ServerMsg = rx.recv_into(&mut buf).await?;

        let ServerMsg::Fit { parameters, config } = msg else {
            panic!("expected a fit instruction");
        };

        assert_eq!(parameters.tensor_type, TENSOR_TYPE);
        assert_eq!(parameters.to_owned_layers(), expected);
        assert_eq!(FitConfig::from_config(&config), fit);
        Ok::<_, std::io::Error>(())
    };

    tokio::try_join!(send, recv).unwrap();
}

#[tokio::test]
async fn replies_keep_their_order() {
    let layers = [vec![7u8; 3]];

    let (one, two) = io::duplex(1024);
    let (rx, tx) = io::split(one);
    let (_, mut tx) = comms::channel(rx, tx);
    let (peer_rx, peer_tx) = io::split(two);
    let (mut rx, _) = comms::channel(peer_rx, peer_tx);

    tx.send(&ClientMsg::GetParametersRes {
        parameters: Parameters::new(&layers),
    })
    .await
    .unwrap();
    tx.send(&ClientMsg::FitRes {
        parameters: Parameters::new(&layers),
        num_examples: 20,
    })
    .await
    .unwrap();
    tx.send(&ClientMsg::EvaluateRes {
        loss: 0.5,
        num_examples: 4,
    })
    .await
    .unwrap();

    let mut buf = Vec::new();
    let msg: ClientMsg = rx.recv_into(&mut buf).await.unwrap();
    assert_eq!(msg.kind(), "get_parameters_res");

    let msg: ClientMsg = rx.recv_into(&mut buf).await.unwrap();
    let ClientMsg::FitRes {
        parameters,
        num_examples,
    } = msg
    else {
        panic!("expected a fit reply");
    };
    assert_eq!(num_examples, 20);
    assert_eq!(parameters.tensors, vec![&[7u8, 7, 7][..]]);

    let msg: ClientMsg = rx.recv_into(&mut buf).await.unwrap();
    assert_eq!(
        msg,
        ClientMsg::EvaluateRes {
            loss: 0.5,
            num_examples: 4
        }
    );
}

#[tokio::test]
async fn reconnect_and_close_ends_the_stream() {
    let (one, two) = io::duplex(256);
    let (rx, tx) = io::split(one);
    let (_, mut tx) = comms::channel(rx, tx);
    let (peer_rx, peer_tx) = io::split(two);
    let (mut rx, _) = comms::channel(peer_rx, peer_tx);

    tx.send(&ServerMsg::Reconnect(Reconnect { seconds: Some(5) }))
        .await
        .unwrap();
    tx.close().await.unwrap();

    let mut buf = Vec::new();
    let msg: ServerMsg = rx.recv_into(&mut buf).await.unwrap();
    assert_eq!(msg, ServerMsg::Reconnect(Reconnect { seconds: Some(5) }));

    let err = rx.recv_into::<ServerMsg>(&mut buf).await.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
}

#[tokio::test]
async fn oversized_frames_are_rejected() {
    let (one, mut two) = io::duplex(256);
    let (rx, tx) = io::split(one);
    let (rx, _) = comms::channel(rx, tx);
    let mut rx = rx.with_max_frame_size(16);

    two.write_all(&1024u64.to_be_bytes()).await.unwrap();

    let mut buf = Vec::new();
    let err = rx.recv_into::<ServerMsg>(&mut buf).await.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
}
