use modlink_client::{word, Client, TcpConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = Client::tcp(TcpConfig::new("127.0.0.1", 1));
    client.connect().await?;

    let data = client.read_holding_registers(0, 2).await?;
    let value = word::decode_u32(&data, word::WordOrder::BigEndian)?;
    println!("registers 0..2 as u32: {value}");

    client.close().await?;
    Ok(())
}
